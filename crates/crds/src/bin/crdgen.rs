//! Prints the SparkNotebook CustomResourceDefinition as YAML.

use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&crds::SparkNotebook::crd())?);
    Ok(())
}
