use std::env;

fn main() {
    // The engine ships as a separate staticlib; only link it when the
    // native bridge is compiled in.
    if env::var("CARGO_FEATURE_NATIVE_ENGINE").is_ok() {
        if let Ok(dir) = env::var("IPAD_RUST_CORE_LIB_DIR") {
            println!("cargo:rustc-link-search=native={}", dir);
        }
        println!("cargo:rustc-link-lib=static=ipad_rust_core");
    }

    // For iOS/macOS targets, link against system frameworks
    let target = env::var("TARGET").unwrap_or_default();
    if target.contains("apple") {
        println!("cargo:rustc-link-lib=framework=Foundation");
        if target.contains("ios") {
            println!("cargo:rustc-link-lib=framework=UIKit");
        }
    }

    println!("cargo:rerun-if-env-changed=IPAD_RUST_CORE_LIB_DIR");
    println!("cargo:rerun-if-changed=build.rs");
}
