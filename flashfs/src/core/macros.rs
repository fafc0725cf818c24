#[macro_export]
macro_rules! vfs_error_wiring {
    (
        top => $top:ty {
            $($top_src:ty : $top_variant:ident),+ $(,)?   // layer errors -> VfsError::<Variant>
        } $(,)?
    ) => {
        $crate::__impl_into_vfserror!{ $top; $( $top_src => $top_variant ),+ }
    };
}

#[macro_export]
macro_rules! __impl_into_vfserror {
    ($top:ty; $($t:ty => $variant:ident),+ $(,)?) => {
        $(
            impl From<$t> for $top {
                #[inline]
                fn from(e: $t) -> Self { <$top>::$variant(e) }
            }
        )+
    }
}

#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr) => {
        if !$cond {
            return Err($err.into());
        }
    };
}
