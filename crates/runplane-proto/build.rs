use std::env;
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?);
    let workspace_root = manifest_dir
        .ancestors()
        .nth(2)
        .ok_or("runplane-proto must live two levels below the workspace root")?;
    let proto_dir = workspace_root.join("proto");

    let proto_files = [proto_dir.join("runplane/v1/worker_service.proto")];

    for proto in &proto_files {
        println!("cargo:rerun-if-changed={}", proto.display());
    }
    println!("cargo:rerun-if-env-changed=PROTOC");

    // src/gen is checked in; regenerate it only when a protoc is configured.
    if env::var_os("PROTOC").is_none() {
        return Ok(());
    }

    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .out_dir("src/gen")
        .compile_protos(&proto_files, &[proto_dir])?;

    Ok(())
}
