fn main() -> Result<(), Box<dyn std::error::Error>> {
    std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    println!("cargo:rerun-if-changed=proto/metrics.proto");
    tonic_build::compile_protos("proto/metrics.proto")?;
    Ok(())
}
