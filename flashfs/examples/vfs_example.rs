// SPDX-License-Identifier: MIT

use flashfs::prelude::*;
use flashio::ERASED_BYTE;
use std::time::Instant;

fn print_io_stats(label: &str, s: &IoStats) {
    println!(
        "[{label}] R={} ({} B) W={} ({} B) E={} | ioctl={} sync={} | maxRead={}B maxWrite={}B",
        s.reads, s.read_bytes, s.writes, s.write_bytes, s.erases, s.ioctls, s.syncs, s.max_read, s.max_write
    );
}

fn main() {
    const BLOCK_SIZE: u32 = 4096;
    const BLOCK_COUNT: u32 = 256;
    let geometry = Geometry::new(BLOCK_SIZE, BLOCK_COUNT);

    println!("=== flashfs VFS (instrumented) ===");
    println!("Allocating {} KiB flash...", BLOCK_SIZE * BLOCK_COUNT / 1024);

    let mut buf = vec![ERASED_BYTE; (BLOCK_SIZE * BLOCK_COUNT) as usize];
    let mut mem = MemFlash::new(&mut buf, geometry);

    // 1) FORMAT
    let t0 = Instant::now();
    let mut io_for_format = IOCounter::new(&mut mem);
    LittleFsVfs::mkfs(&mut io_for_format).expect("mkfs failed");
    let dt_fmt = t0.elapsed();
    print_io_stats("format", &io_for_format.snapshot());

    // 2) POPULATE
    let mut io_for_write = IOCounter::new(io_for_format.into_inner());
    let t1 = Instant::now();
    {
        let fs = LittleFsVfs::new(&mut io_for_write).expect("mount failed");
        fs.mkdir("/etc").expect("mkdir failed");
        for i in 0..16 {
            let mut file = fs.open(&format!("/etc/conf{i}.txt"), "w").expect("open failed");
            file.write_text(&format!("entry = {i}\n").repeat(200)).expect("write failed");
            file.close().expect("close failed");
        }
        fs.rename("/etc/conf0.txt", "/boot.txt").expect("rename failed");
    }
    let dt_write = t1.elapsed();
    print_io_stats("populate", &io_for_write.snapshot());

    // 3) CHECK + LIST
    let mut io_for_read = IOCounter::new(io_for_write.into_inner());
    let t2 = Instant::now();
    {
        let fs = LittleFsVfs::new(&mut io_for_read).expect("mount failed");
        fs.mount(true, false).expect("read-only remount failed");
        let report = fs.check().expect("check failed");
        for entry in fs.ilistdir(Some("/etc")).expect("ilistdir failed") {
            let entry = entry.expect("listing failed");
            println!("  {:?} {:>6} B  {}", entry.kind, entry.size, entry.name.as_str().unwrap_or("?"));
        }
        let st = fs.statvfs("/").expect("statvfs failed");
        println!(
            "rev {} | files={} dirs={} | used {} of {} blocks | ok={}",
            report.revision,
            report.files,
            report.dirs,
            st.blocks - st.bfree,
            st.blocks,
            report.ok()
        );
    }
    let dt_read = t2.elapsed();
    print_io_stats("read-only", &io_for_read.snapshot());

    println!("\nSummary:");
    println!("Total     : {:?}", t0.elapsed());
    println!("Format    : {dt_fmt:?}");
    println!("Populate  : {dt_write:?}");
    println!("Read-only : {dt_read:?}");
}
