use jpath::{Query, Value};
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    let src = r#"{"name":"MyCompany", "employees":[{"name":"Joey","role":"dev"},{"name":"Dean","role":"ops"}]}"#;
    let mut doc: Value = serde_json::from_str(src)?;

    let ops = Query::parse("employees[@role=ops].name")?;
    println!("{}", ops.get(&doc)?);

    Query::parse("employees[1].role")?.set(&mut doc, "lead".into())?;

    for (key, name) in Query::parse("employees[*].name")?.iter_items(&doc)? {
        println!("{key}: {name}");
    }
    println!("{}", serde_json::to_string_pretty(&doc)?);

    Ok(())
}
