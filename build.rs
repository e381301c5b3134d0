fn main() {
    // Platform-specific linker setup for the optional N-API bridge.
    if std::env::var("CARGO_FEATURE_NAPI").is_ok() {
        napi_build::setup();
    }
}
