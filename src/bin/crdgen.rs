//! Print the DragonflyDb CustomResourceDefinition as YAML.
//!
//! `cargo run --bin crdgen > config/crd/dragonflydb.yaml`

use kube::CustomResourceExt;

use dragonfly_operator::crd::DragonflyDb;

fn main() -> Result<(), serde_yaml::Error> {
    let crd = serde_yaml::to_string(&DragonflyDb::crd())?;
    print!("{crd}");
    Ok(())
}
