//! Build script for collecting information about the program build.

fn main() {
    built::write_built_file().expect("Failed to acquire build-time information");
}
