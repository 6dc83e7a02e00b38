//! Build script for torch-bridge.
//!
//! With the `libtorch` feature enabled the crate links against the
//! `LibTorchSharp` shared library. Set `LIBTORCHSHARP_DIR` to the directory
//! containing it when it is not on the default linker search path.

use std::env;

fn main() {
    println!("cargo:rerun-if-env-changed=LIBTORCHSHARP_DIR");

    if env::var_os("CARGO_FEATURE_LIBTORCH").is_none() {
        return;
    }

    if let Ok(dir) = env::var("LIBTORCHSHARP_DIR") {
        println!("cargo:rustc-link-search=native={dir}");
    }
}
