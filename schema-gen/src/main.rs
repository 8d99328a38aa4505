use pvcast::input::AppConfig;
use schemars::schema_for;

fn main() {
    let schema = schema_for!(AppConfig);
    println!("{}", serde_json::to_string_pretty(&schema).unwrap());
}
