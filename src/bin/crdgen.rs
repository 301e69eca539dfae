//! # CRD Generator
//!
//! Prints the CustomResourceDefinitions of every resource the controller
//! touches as one multi-document YAML stream. The real definitions ship with
//! the hub; these are for local clusters and tests.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use addon_deploy_controller::crd::{ManagedCluster, ManagedClusterAddOn, ManifestWork};
use kube::core::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    let crds = [
        ManagedClusterAddOn::crd(),
        ManagedCluster::crd(),
        ManifestWork::crd(),
    ];
    for crd in &crds {
        println!("---");
        print!("{}", serde_yaml::to_string(crd)?);
    }
    Ok(())
}
