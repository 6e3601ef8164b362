//! Prints the InstanceMapping CRD manifest as YAML.
//!
//! Usage: `cargo run -p crds --bin crdgen > config/crd/instancemapping.yaml`

use crds::InstanceMapping;
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    let manifest = serde_yaml::to_string(&InstanceMapping::crd())?;
    print!("{manifest}");
    Ok(())
}
