use kube::CustomResourceExt;
use node_template_operator::crd::NodeTemplate;

fn main() -> Result<(), serde_yaml::Error> {
    print!("{}", serde_yaml::to_string(&NodeTemplate::crd())?);
    Ok(())
}
