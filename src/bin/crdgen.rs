use cpms_operator::crd::{ControlPlaneMachineSet, Machine};
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&ControlPlaneMachineSet::crd())?);
    println!("---");
    print!("{}", serde_yaml::to_string(&Machine::crd())?);
    Ok(())
}
