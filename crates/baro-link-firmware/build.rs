//! Bakes the node identity from `.env` into the firmware image.
//!
//! ```text
//! BARO_DEVICE_ID=3
//! BARO_DEVICE_NAME=DEV003
//! ```

const BAKED_VARS: [&str; 2] = ["BARO_DEVICE_ID", "BARO_DEVICE_NAME"];

fn main() {
    // A missing .env is fine; the firmware falls back to its defaults
    let _ = dotenvy::dotenv();

    for key in BAKED_VARS {
        if let Ok(value) = std::env::var(key) {
            println!("cargo:rustc-env={key}={value}");
        }
        println!("cargo:rerun-if-env-changed={key}");
    }
    println!("cargo:rerun-if-changed=.env");

    println!("cargo:rustc-link-arg=-Tlinkall.x");
}
