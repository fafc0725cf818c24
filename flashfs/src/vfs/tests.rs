// SPDX-License-Identifier: MIT

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use flashio::ERASED_BYTE;

use crate::prelude::*;

const BS: u32 = 512;
const COUNT: u32 = 64;

fn geometry() -> Geometry {
    Geometry::new(BS, COUNT)
}

fn blank() -> Vec<u8> {
    vec![ERASED_BYTE; (BS * COUNT) as usize]
}

fn mounted(buf: &mut [u8]) -> LittleFsVfs<MemFlash<'_>> {
    LittleFsVfs::mkfs(MemFlash::new(buf, geometry())).unwrap();
    let fs = LittleFsVfs::new(MemFlash::new(buf, geometry())).unwrap();
    assert_eq!(fs.state(), MountState::Mounted);
    fs
}

fn names<D: BlockDevice>(stream: DirectoryStream<D>) -> Vec<String> {
    stream
        .map(|entry| String::from(entry.unwrap().name.as_str().unwrap()))
        .collect()
}

#[test]
fn test_blank_device_waits_for_format() {
    let mut buf = blank();
    let fs = LittleFsVfs::new(MemFlash::new(&mut buf, geometry())).unwrap();
    assert_eq!(fs.state(), MountState::NoFilesystemDetected);

    let err = fs.stat("/").unwrap_err();
    assert_eq!(err, VfsError::Usage(UsageError::NotMounted));
    assert_eq!(err.errno(), Errno::ENODEV);
    assert!(fs.open("/a", "w").is_err());

    assert_eq!(fs.mount(false, false), Err(VfsError::Engine(LfsError::Corrupt)));
    assert_eq!(fs.state(), MountState::NoFilesystemDetected);

    fs.mount(false, true).unwrap();
    assert_eq!(fs.state(), MountState::Mounted);
    assert!(fs.stat("/").unwrap().is_dir());
}

#[test]
fn test_format_leaves_filesystem_unmounted() {
    let mut buf = blank();
    let fs = mounted(&mut buf);
    fs.open("/keep", "w").unwrap().write(b"x").unwrap();
    fs.format().unwrap();
    assert_eq!(fs.state(), MountState::Unmounted);
    assert!(fs.stat("/").is_err());

    fs.mount(false, false).unwrap();
    assert_eq!(fs.import_stat("/keep"), ImportStat::NoExist);
}

#[test]
fn test_unmount_is_logical() {
    let mut buf = blank();
    let fs = mounted(&mut buf);
    fs.unmount().unwrap();
    assert_eq!(fs.state(), MountState::Mounted);
    fs.mkdir("/still").unwrap();
}

#[test]
fn test_closed_handle() {
    let mut buf = blank();
    let fs = mounted(&mut buf);
    let mut file = fs.open("/f", "wb").unwrap();
    file.close().unwrap();
    assert!(file.is_closed());
    file.close().unwrap();

    let err = file.write(b"late").unwrap_err();
    assert_eq!(err, VfsError::Usage(UsageError::Closed));
    assert_eq!(err.errno(), Errno::EBADF);
    assert!(file.read(4).is_err());
    assert!(file.seek(0, SeekWhence::Set).is_err());
}

#[test]
fn test_drop_closes_and_commits() {
    let mut buf = blank();
    {
        let fs = mounted(&mut buf);
        let mut file = fs.open("/log", "w").unwrap();
        file.write_text("kept").unwrap();
    }
    let fs = LittleFsVfs::new(MemFlash::new(&mut buf, geometry())).unwrap();
    let mut file = fs.open("/log", "r").unwrap();
    assert_eq!(file.read_text(64).unwrap(), "kept");
}

#[test]
fn test_text_and_binary_streams() {
    let mut buf = blank();
    let fs = mounted(&mut buf);

    let mut bin = fs.open("/b", "wb").unwrap();
    assert_eq!(bin.kind(), StreamKind::Binary);
    assert_eq!(bin.write_text("no"), Err(VfsError::Usage(UsageError::NotText)));
    bin.write(&[0xFF, 0xFE]).unwrap();
    bin.close().unwrap();

    let mut text = fs.open("/b", "r").unwrap();
    assert!(text.mode().is_text());
    assert_eq!(text.read_text(8), Err(VfsError::Usage(UsageError::NotText)));

    let mut bin = fs.open("/b", "rb").unwrap();
    assert_eq!(bin.read_text(8), Err(VfsError::Usage(UsageError::NotText)));
    assert_eq!(bin.read_to_end().unwrap(), vec![0xFF, 0xFE]);
}

#[test]
fn test_read_short_only_at_end() {
    let mut buf = blank();
    let fs = mounted(&mut buf);
    let data: Vec<u8> = (0..1200u32).map(|i| i as u8).collect();
    let mut file = fs.open("/d", "w+b").unwrap();
    assert_eq!(file.write(&data).unwrap(), 1200);
    file.flush().unwrap();
    assert_eq!(file.seek(0, SeekWhence::Set).unwrap(), 0);

    assert_eq!(file.read(1000).unwrap().len(), 1000);
    assert_eq!(file.tell().unwrap(), 1000);
    assert_eq!(file.read(1000).unwrap().len(), 200);
    assert!(file.read(1000).unwrap().is_empty());
    assert_eq!(file.size().unwrap(), 1200);
}

#[test]
fn test_open_rejects_missing_and_directories() {
    let mut buf = blank();
    let fs = mounted(&mut buf);
    fs.mkdir("/d").unwrap();

    let err = fs.open("/missing", "r").err().unwrap();
    assert_eq!(err.errno(), Errno::ENOENT);
    let err = fs.open("/d", "w").err().unwrap();
    assert_eq!(err.errno(), Errno::EISDIR);

    fs.open("/once", "x").unwrap().close().unwrap();
    let err = fs.open("/once", "x").err().unwrap();
    assert_eq!(err, VfsError::Engine(LfsError::Exist));
}

#[test]
fn test_directory_stream_lifecycle() {
    let mut buf = blank();
    let fs = mounted(&mut buf);
    fs.mkdir("/d").unwrap();
    fs.open("/d/b", "w").unwrap().write(b"12").unwrap();
    fs.open("/d/a", "w").unwrap().write(b"1").unwrap();

    let mut stream = fs.ilistdir(Some("/d")).unwrap();
    let first = stream.next().unwrap().unwrap();
    assert_eq!(first.name, EntryName::Text("a".into()));
    assert_eq!(first.kind, EntryKind::File);
    assert_eq!((first.ino, first.size), (0, 1));
    assert!(stream.next().unwrap().is_ok());
    assert!(stream.next().is_none());
    assert!(stream.is_closed());
    assert!(stream.next().is_none());

    let err = fs.ilistdir(Some("/d/a")).err().unwrap();
    assert_eq!(err.errno(), Errno::ENOTDIR);
}

#[test]
fn test_directory_stream_closes_on_error() {
    let mut buf = blank();
    let fs = mounted(&mut buf);
    fs.mkdir("/x").unwrap();

    let mut stream = fs.ilistdir(None).unwrap();
    fs.format().unwrap();
    assert!(matches!(stream.next(), Some(Err(_))));
    assert!(stream.is_closed());
    assert!(stream.next().is_none());
}

#[test]
fn test_byte_listing() {
    let mut buf = blank();
    let fs = mounted(&mut buf);
    fs.mkdir("/sub").unwrap();
    let entries: Vec<_> = fs.ilistdir_bytes(b"/").unwrap().map(Result::unwrap).collect();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, EntryName::Bytes(b"sub".to_vec()));
    assert_eq!(entries[0].mode(), S_IFDIR);

    let err = fs.ilistdir_bytes(&[0xFF]).err().unwrap();
    assert_eq!(err, VfsError::Usage(UsageError::InvalidPath));
}

#[test]
fn test_remove_and_rmdir_check_kind() {
    let mut buf = blank();
    let fs = mounted(&mut buf);
    fs.mkdir("/dir").unwrap();
    fs.open("/file", "w").unwrap().close().unwrap();

    assert_eq!(fs.remove("/dir").unwrap_err().errno(), Errno::EISDIR);
    assert_eq!(fs.rmdir("/file").unwrap_err().errno(), Errno::ENOTDIR);
    assert_eq!(fs.rmdir("/none").unwrap_err().errno(), Errno::ENOENT);

    fs.remove("/file").unwrap();
    fs.rmdir("/dir").unwrap();
    assert_eq!(names(fs.ilistdir(Some("/")).unwrap()).len(), 0);
}

#[test]
fn test_rmdir_non_empty() {
    let mut buf = blank();
    let fs = mounted(&mut buf);
    fs.mkdir("/d").unwrap();
    fs.mkdir("/d/e").unwrap();
    assert_eq!(fs.rmdir("/d").unwrap_err().errno(), Errno::ENOTEMPTY);
    assert_eq!(fs.mkdir("/d").unwrap_err().errno(), Errno::EEXIST);
}

#[test]
fn test_stat_records() {
    let mut buf = blank();
    let fs = mounted(&mut buf);
    fs.open("/s", "w").unwrap().write(b"abcd").unwrap();

    let st = fs.stat("/s").unwrap();
    assert!(st.is_file());
    assert_eq!(st.size, 4);
    assert_eq!((st.atime, st.mtime, st.ctime, st.ino), (0, 0, 0, 0));

    let vfs = fs.statvfs("/").unwrap();
    assert_eq!(vfs.bsize, BS);
    assert_eq!(vfs.frsize, BS);
    assert_eq!(vfs.blocks, COUNT);
    assert_eq!(vfs.bfree, vfs.bavail);
    assert_eq!(vfs.namemax, 255);
    assert_eq!(vfs.bfree, COUNT - 4);
}

#[test]
fn test_cwd_resolution() {
    let mut buf = blank();
    let fs = mounted(&mut buf);
    assert_eq!(fs.getcwd(), "/");
    fs.mkdir("/lib").unwrap();
    fs.chdir("lib").unwrap();
    assert_eq!(fs.getcwd(), "/lib");

    fs.open("mod.py", "w").unwrap().write(b"x = 1").unwrap();
    assert_eq!(fs.import_stat("/lib/mod.py"), ImportStat::File);
    assert_eq!(fs.import_stat("/lib"), ImportStat::Dir);
    assert_eq!(fs.import_stat("nope.py"), ImportStat::NoExist);
    assert_eq!(names(fs.ilistdir(None).unwrap()), ["mod.py"]);

    assert_eq!(fs.chdir("mod.py").unwrap_err().errno(), Errno::ENOTDIR);
    assert_eq!(fs.chdir("/missing").unwrap_err().errno(), Errno::ENOENT);
    fs.chdir("..").unwrap();
    assert_eq!(fs.getcwd(), "/");
}

#[test]
fn test_read_only_mount_rejects_writes() {
    let mut buf = blank();
    {
        let fs = mounted(&mut buf);
        fs.open("/ro", "w").unwrap().write(b"data").unwrap();
    }

    let mut dev = MemFlash::new(&mut buf, geometry());
    let mut counter = IOCounter::new(&mut dev);
    {
        let fs = LittleFsVfs::new(&mut counter).unwrap();
        fs.mount(true, false).unwrap();
        assert!(fs.is_read_only());

        assert_eq!(fs.open("/ro", "r").unwrap().read_to_end().unwrap(), b"data");
        assert_eq!(fs.mkdir("/new").unwrap_err().errno(), Errno::EROFS);
        assert_eq!(
            fs.open("/other", "w").err().unwrap(),
            VfsError::Device(FlashIOError::ReadOnly)
        );

        let mut file = fs.open("/ro", "a").unwrap();
        file.write(b"more").unwrap();
        assert_eq!(file.close().unwrap_err().errno(), Errno::EROFS);
        assert_eq!(fs.format().unwrap_err().errno(), Errno::EROFS);
    }
    assert_eq!(counter.snapshot().mutations(), 0);
}

#[test]
fn test_read_only_device_cannot_be_formatted() {
    let mut buf = blank();
    let err = LittleFsVfs::mkfs(MemFlash::new(&mut buf, geometry()).read_only()).unwrap_err();
    assert_eq!(err, VfsError::Usage(UsageError::ReadOnly));

    let fs = LittleFsVfs::new(MemFlash::new(&mut buf, geometry()).read_only()).unwrap();
    assert_eq!(fs.mount(false, true).unwrap_err().errno(), Errno::EROFS);
}

#[test]
fn test_check_reports_consistency() {
    let mut buf = blank();
    let fs = mounted(&mut buf);
    fs.mkdir("/a").unwrap();
    fs.open("/a/f", "w").unwrap().write(&[3u8; 900]).unwrap();
    let rep = fs.check().unwrap();
    assert!(rep.ok(), "{:?}", rep.first_error());
    assert_eq!((rep.files, rep.dirs), (1, 1));
    assert_eq!(rep.used_blocks, COUNT - fs.statvfs("/").unwrap().bfree);
}

#[test]
fn test_text_read_keeps_split_characters() {
    let mut buf = blank();
    let fs = mounted(&mut buf);
    fs.open("/utf8", "w").unwrap().write_text("é!ü").unwrap();

    let mut file = fs.open("/utf8", "r").unwrap();
    assert_eq!(file.read_text(1).unwrap(), "é");
    assert_eq!(file.tell().unwrap(), 2);
    assert_eq!(file.read_text(2).unwrap(), "!");
    assert_eq!(file.tell().unwrap(), 3);
    assert_eq!(file.read_text(8).unwrap(), "ü");
    assert_eq!(file.read_text(8).unwrap(), "");
}

#[test]
fn test_text_read_of_invalid_bytes_keeps_position() {
    let mut buf = blank();
    let fs = mounted(&mut buf);
    fs.open("/raw", "wb").unwrap().write(&[b'a', 0xFF, b'b']).unwrap();

    let mut file = fs.open("/raw", "r").unwrap();
    assert_eq!(file.read_text(3), Err(VfsError::Usage(UsageError::NotText)));
    assert_eq!(file.tell().unwrap(), 0);
    assert_eq!(file.read_text(1).unwrap(), "a");
}

#[test]
fn test_write_past_device_capacity_fails_early() {
    let mut buf = blank();
    let fs = mounted(&mut buf);
    let mut file = fs.open("/sparse", "wb").unwrap();
    file.seek(256 << 20, SeekWhence::Set).unwrap();

    let err = file.write(b"x").unwrap_err();
    assert_eq!(err, VfsError::Engine(LfsError::NoSpc));
    assert_eq!(err.errno(), Errno::ENOSPC);
    assert_eq!(file.size().unwrap(), 0);
    file.close().unwrap();
    assert_eq!(fs.stat("/sparse").unwrap().size, 0);
}
