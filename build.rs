// Pick the limb width from the target unless one was forced.
fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    #[cfg(all(target_pointer_width = "64", not(feature = "u32")))]
    println!("cargo:rustc-cfg=feature=\"u64\"");
    #[cfg(all(not(target_pointer_width = "64"), not(feature = "u64")))]
    println!("cargo:rustc-cfg=feature=\"u32\"");
}
