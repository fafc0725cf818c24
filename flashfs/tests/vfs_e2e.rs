// SPDX-License-Identifier: MIT

use std::io::{self, Read, Seek, SeekFrom, Write};

use flashfs::prelude::*;
use flashio::ERASED_BYTE;

const BS: u32 = 512;
const COUNT: u32 = 64;

fn geometry() -> Geometry {
    Geometry::new(BS, COUNT)
}

fn blank(blocks: u32) -> Vec<u8> {
    vec![ERASED_BYTE; (BS * blocks) as usize]
}

fn fresh(buf: &mut [u8]) -> LittleFsVfs<MemFlash<'_>> {
    let fs = LittleFsVfs::new(MemFlash::new(buf, geometry())).unwrap();
    fs.mount(false, true).unwrap();
    fs
}

fn write_file<D: BlockDevice>(fs: &LittleFsVfs<D>, path: &str, mode: &str, data: &[u8]) {
    let mut file = fs.open(path, mode).unwrap();
    let mut off = 0;
    while off < data.len() {
        off += file.write(&data[off..]).unwrap();
    }
    file.close().unwrap();
}

fn read_file<D: BlockDevice>(fs: &LittleFsVfs<D>, path: &str) -> Vec<u8> {
    let mut file = fs.open(path, "rb").unwrap();
    let data = file.read_to_end().unwrap();
    file.close().unwrap();
    data
}

#[test]
fn test_hello_end_to_end() {
    let mut buf = blank(COUNT);
    LittleFsVfs::mkfs(MemFlash::new(&mut buf, geometry())).unwrap();
    {
        let fs = LittleFsVfs::new(MemFlash::new(&mut buf, geometry())).unwrap();
        fs.mount(false, false).unwrap();

        let mut file = fs.open("/a.txt", "w").unwrap();
        assert_eq!(file.write(b"hello").unwrap(), 5);
        file.close().unwrap();

        let mut file = fs.open("/a.txt", "r").unwrap();
        assert_eq!(file.read(64).unwrap(), b"hello");
        file.close().unwrap();

        let entries: Vec<DirEntry> = fs.ilistdir(Some("/")).unwrap().map(Result::unwrap).collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name.as_str(), Some("a.txt"));
        assert_eq!(entries[0].kind, EntryKind::File);
        assert_eq!(entries[0].size, 5);
    }

    let fs = LittleFsVfs::new(MemFlash::new(&mut buf, geometry())).unwrap();
    assert_eq!(fs.state(), MountState::Mounted);
    assert_eq!(read_file(&fs, "/a.txt"), b"hello");
}

#[test]
fn test_blank_device_formats_on_mount() {
    let mut buf = blank(COUNT);
    let fs = LittleFsVfs::new(MemFlash::new(&mut buf, geometry())).unwrap();
    assert_eq!(fs.state(), MountState::NoFilesystemDetected);
    fs.mount(false, true).unwrap();
    let st = fs.stat("/").unwrap();
    assert!(st.is_dir());
    assert_eq!(st.mode, S_IFDIR);
}

#[test]
fn test_every_write_mode_round_trips() {
    let mut buf = blank(COUNT);
    let fs = fresh(&mut buf);
    let data: Vec<u8> = (0..1500u32).map(|i| (i * 7) as u8).collect();

    for (i, mode) in ["w", "wb", "w+", "w+b", "wt", "x", "xb", "a", "ab", "a+"].iter().enumerate() {
        let path = format!("/f{i}");
        write_file(&fs, &path, mode, &data);
        assert_eq!(read_file(&fs, &path), data, "mode {mode}");
    }
}

#[test]
fn test_append_truncate_and_update() {
    let mut buf = blank(COUNT);
    let fs = fresh(&mut buf);

    write_file(&fs, "/f", "w", b"ab");
    write_file(&fs, "/f", "a", b"cd");
    assert_eq!(read_file(&fs, "/f"), b"abcd");

    let mut file = fs.open("/f", "r+b").unwrap();
    file.write(b"XY").unwrap();
    file.close().unwrap();
    assert_eq!(read_file(&fs, "/f"), b"XYcd");

    write_file(&fs, "/f", "w", b"z");
    assert_eq!(read_file(&fs, "/f"), b"z");
}

#[test]
fn test_exclusive_create() {
    let mut buf = blank(COUNT);
    let fs = fresh(&mut buf);
    fs.open("/new", "x").unwrap().close().unwrap();
    let err = fs.open("/new", "x").err().unwrap();
    assert_eq!(err.errno(), Errno::EEXIST);
    assert_eq!(err.errno().code(), 17);
}

#[test]
fn test_kind_checked_removal() {
    let mut buf = blank(COUNT);
    let fs = fresh(&mut buf);
    fs.mkdir("/d").unwrap();
    write_file(&fs, "/f", "w", b"1");

    assert_eq!(fs.remove("/d"), Err(VfsError::Usage(UsageError::IsADirectory)));
    assert_eq!(fs.rmdir("/f"), Err(VfsError::Usage(UsageError::NotADirectory)));
    assert_eq!(fs.import_stat("/d"), ImportStat::Dir);
    assert_eq!(fs.import_stat("/f"), ImportStat::File);
}

#[test]
fn test_listing_skips_dot_entries() {
    let mut buf = blank(COUNT);
    let fs = fresh(&mut buf);
    fs.mkdir("/d").unwrap();
    fs.mkdir("/d/inner").unwrap();
    write_file(&fs, "/d/file", "w", b"abc");

    let mut stream = fs.ilistdir(Some("/d")).unwrap();
    let mut seen = Vec::new();
    for entry in stream.by_ref() {
        let entry = entry.unwrap();
        let name = entry.name.as_str().unwrap().to_string();
        assert!(name != "." && name != "..");
        seen.push((name, entry.kind));
    }
    assert_eq!(
        seen,
        [
            ("file".to_string(), EntryKind::File),
            ("inner".to_string(), EntryKind::Directory)
        ]
    );
    assert!(stream.next().is_none());
    assert!(stream.next().is_none());
}

#[test]
fn test_free_blocks_shrink_as_data_lands() {
    let mut buf = blank(COUNT);
    let fs = fresh(&mut buf);

    let st = fs.statvfs("/").unwrap();
    let used = fs.check().unwrap().used_blocks;
    assert_eq!(st.bfree + used, st.blocks);

    let mut last = st.bfree;
    for i in 0..6 {
        write_file(&fs, &format!("/chunk{i}"), "wb", &[i as u8; 1200]);
        let now = fs.statvfs("/").unwrap().bfree;
        assert!(now < last, "{now} >= {last}");
        last = now;
    }

    for i in 0..6 {
        fs.remove(&format!("/chunk{i}")).unwrap();
    }
    assert_eq!(fs.statvfs("/").unwrap().bfree, st.bfree);
}

#[test]
fn test_fill_reports_no_space() {
    let mut buf = blank(COUNT);
    let fs = fresh(&mut buf);
    let mut file = fs.open("/big", "wb").unwrap();
    let chunk = [0x5Au8; 512];
    let err = loop {
        if let Err(e) = file.write(&chunk).and_then(|_| file.flush()) {
            break e;
        }
    };
    assert_eq!(err.errno(), Errno::ENOSPC);
    drop(file);

    assert!(fs.check().unwrap().ok());
    fs.mkdir("/after").unwrap();
}

#[test]
fn test_rename_moves_and_replaces() {
    let mut buf = blank(COUNT);
    let fs = fresh(&mut buf);
    write_file(&fs, "/old", "w", b"old");
    write_file(&fs, "/target", "w", b"target");
    fs.mkdir("/dir").unwrap();

    fs.rename("/old", "/target").unwrap();
    assert_eq!(fs.import_stat("/old"), ImportStat::NoExist);
    assert_eq!(read_file(&fs, "/target"), b"old");

    fs.rename("/target", "/dir/moved").unwrap();
    assert_eq!(read_file(&fs, "/dir/moved"), b"old");
    assert_eq!(fs.rename("/dir/moved", "/dir").unwrap_err().errno(), Errno::EISDIR);
}

#[test]
fn test_legacy_device() {
    let mut buf = blank(COUNT);
    {
        let fs = LittleFsVfs::new(MemFlash::legacy(&mut buf, geometry())).unwrap();
        fs.mount(false, true).unwrap();
        write_file(&fs, "/legacy", "w", b"sync+count");
    }
    let fs = LittleFsVfs::new(MemFlash::legacy(&mut buf, geometry())).unwrap();
    assert_eq!(read_file(&fs, "/legacy"), b"sync+count");
}

#[test]
fn test_start_block_offsets_the_filesystem() {
    const START: u32 = 8;
    let mut buf = blank(START + COUNT);
    let geo = geometry().with_start_block(START);
    {
        let fs = LittleFsVfs::new(MemFlash::new(&mut buf, geo)).unwrap();
        fs.mount(false, true).unwrap();
        write_file(&fs, "/shifted", "w", b"data");
    }
    let head = (START * BS) as usize;
    assert!(buf[..head].iter().all(|b| *b == ERASED_BYTE));

    let fs = LittleFsVfs::new(MemFlash::new(&mut buf, geo)).unwrap();
    assert_eq!(read_file(&fs, "/shifted"), b"data");
}

#[test]
fn test_device_without_erase_cannot_format() {
    let mut buf = blank(COUNT);
    let err = LittleFsVfs::mkfs(MemFlash::new(&mut buf, geometry()).without_erase()).unwrap_err();
    assert_eq!(err, VfsError::Device(FlashIOError::Unsupported));
    assert_eq!(err.errno(), Errno::EIO);
}

#[test]
fn test_file_backed_image() {
    let mut image = tempfile::tempfile().unwrap();
    image.write_all(&blank(COUNT)).unwrap();
    {
        let fs = LittleFsVfs::new(FileFlash::new(&mut image, geometry())).unwrap();
        fs.mount(false, true).unwrap();
        fs.mkdir("/etc").unwrap();
        write_file(&fs, "/etc/conf", "w", b"key=value\n");
    }
    let fs = LittleFsVfs::new(FileFlash::new(&mut image, geometry())).unwrap();
    assert_eq!(read_file(&fs, "/etc/conf"), b"key=value\n");
    assert!(fs.check().unwrap().ok());
}

#[test]
fn test_std_io_traits() {
    let mut buf = blank(COUNT);
    let fs = fresh(&mut buf);

    let mut file = fs.open("/io", "w+").unwrap();
    writeln!(file, "line one").unwrap();
    file.write_all(b"line two\n").unwrap();
    Write::flush(&mut file).unwrap();
    file.rewind().unwrap();

    let mut text = String::new();
    file.read_to_string(&mut text).unwrap();
    assert_eq!(text, "line one\nline two\n");
    assert_eq!(Seek::seek(&mut file, SeekFrom::End(-4)).unwrap(), 14);
    file.close().unwrap();

    let err = io::Error::from(fs.open("/missing", "r").err().unwrap());
    assert_eq!(err.raw_os_error(), Some(2));
}
