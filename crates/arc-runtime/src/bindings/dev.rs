//! `dev` namespace, registered only in Dev Mode.

use rhai::Module;

use arc_vfs::{Namespace, VfsPath};

use super::native;
use crate::services::{fail, Shared};

pub fn module(services: &Shared) -> Module {
    let mut module = Module::new();

    native!(module, services, "reloadCartridge", |s| {
        s.reload_requested = true;
    });

    native!(module, services, "captureFrame", |s, path: &str| {
        // Captures may only land in the writable namespaces.
        match VfsPath::parse(path) {
            Ok(target) if target.namespace() != Namespace::Cart => {
                s.pending_capture = Some(target.to_string());
                true
            }
            Ok(_) => fail(
                s.dev_mode,
                "dev.captureFrame",
                "captures must go to save:/ or temp:/",
                false,
            ),
            Err(err) => fail(s.dev_mode, "dev.captureFrame", err, false),
        }
    });

    native!(module, services, "profileBegin", |s, name: &str| {
        s.profile.begin(name.to_string());
    });
    native!(module, services, "profileEnd", |s, name: &str| {
        if s.profile.end(name) {
            true
        } else {
            fail(s.dev_mode, "dev.profileEnd", "mismatched profile span", false)
        }
    });

    module
}
