//! `fs` namespace: the sandboxed file API.
//!
//! Everything goes through the VFS; failures surface as the documented
//! failure values (`()` for readers, `false` for writers) plus last error.

use rhai::{Blob, Dynamic, Module};

use super::native;
use crate::services::{fail, Shared};

pub fn module(services: &Shared) -> Module {
    let mut module = Module::new();

    native!(module, services, "readText", |s, path: &str| {
        match s.vfs.read_text(path) {
            Ok(text) => Dynamic::from(text),
            Err(err) => fail(s.dev_mode, "fs.readText", err, Dynamic::UNIT),
        }
    });

    native!(module, services, "readBytes", |s, path: &str| {
        match s.vfs.read_bytes(path) {
            Ok(bytes) => Dynamic::from_blob(bytes),
            Err(err) => fail(s.dev_mode, "fs.readBytes", err, Dynamic::UNIT),
        }
    });

    native!(module, services, "writeText", |s, path: &str, text: &str| {
        match s.vfs.write_text(path, text) {
            Ok(()) => true,
            Err(err) => fail(s.dev_mode, "fs.writeText", err, false),
        }
    });

    native!(module, services, "writeBytes", |s, path: &str, data: Blob| {
        match s.vfs.write_bytes(path, &data) {
            Ok(()) => true,
            Err(err) => fail(s.dev_mode, "fs.writeBytes", err, false),
        }
    });

    native!(module, services, "exists", |s, path: &str| {
        match s.vfs.exists(path) {
            Ok(exists) => exists,
            Err(err) => fail(s.dev_mode, "fs.exists", err, false),
        }
    });

    native!(module, services, "listDir", |s, path: &str| {
        match s.vfs.list_dir(path) {
            Ok(names) => Dynamic::from(
                names
                    .into_iter()
                    .map(Dynamic::from)
                    .collect::<rhai::Array>(),
            ),
            Err(err) => fail(s.dev_mode, "fs.listDir", err, Dynamic::UNIT),
        }
    });

    native!(module, services, "mkdir", |s, path: &str| {
        match s.vfs.mkdir(path) {
            Ok(()) => true,
            Err(err) => fail(s.dev_mode, "fs.mkdir", err, false),
        }
    });

    native!(module, services, "remove", |s, path: &str| {
        match s.vfs.remove(path) {
            Ok(()) => true,
            Err(err) => fail(s.dev_mode, "fs.remove", err, false),
        }
    });

    native!(module, services, "stat", |s, path: &str| {
        match s.vfs.stat(path) {
            Ok(stat) => {
                let mut map = rhai::Map::new();
                map.insert("type".into(), Dynamic::from(stat.kind.as_str().to_string()));
                map.insert("size".into(), Dynamic::from(stat.size as i64));
                map.insert(
                    "mtime".into(),
                    stat.mtime
                        .map(|mtime| Dynamic::from(mtime as i64))
                        .unwrap_or(Dynamic::UNIT),
                );
                Dynamic::from_map(map)
            }
            Err(err) => fail(s.dev_mode, "fs.stat", err, Dynamic::UNIT),
        }
    });

    module
}
