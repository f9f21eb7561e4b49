use gisp::{CoreToolbox, Env, Gisp, JsonToolbox, Key, Native, Toolbox, TypeTag, Value};
use std::collections::BTreeMap;
use std::rc::Rc;

const SETTINGS: &str = r#"{
    "thresholds": [10, 50, 90],
    "labels": {"low": "green", "mid": "amber", "high": "red"}
}"#;

fn main() {
    println!("=== Gisp: Embedding Demo ===\n");

    let settings = match SETTINGS.parse::<JsonToolbox>() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Bad settings document: {}", e);
            return;
        }
    };
    let mut builtins: BTreeMap<String, Box<dyn Toolbox>> = BTreeMap::new();
    builtins.insert("0-core".to_string(), Box::new(CoreToolbox));
    builtins.insert("1-settings".to_string(), Box::new(settings));
    let mut gisp = Gisp::new(builtins);

    // A host function with two overloads: ints are scored, strings are looked up
    let scored = Native {
        params: &[TypeTag::Int],
        rest: None,
        func: |env, args| {
            let level = match (env.lookup("thresholds"), &args[0]) {
                (Some(Value::List(limits)), Value::Int(n)) => {
                    let limits = limits.borrow();
                    limits
                        .iter()
                        .filter(|limit| matches!(limit, Value::Int(l) if n >= l))
                        .count()
                }
                _ => 0,
            };
            Ok(Value::from(["low", "low", "mid", "high"][level.min(3)]))
        },
    };
    let named = Native {
        params: &[TypeTag::Str],
        rest: None,
        func: |env, args| match (env.lookup("labels"), &args[0]) {
            (Some(Value::Map(labels)), Value::Str(name)) => {
                let label = labels.borrow().get(&Key::Str(name.clone())).cloned();
                Ok(label.unwrap_or_default())
            }
            _ => Ok(Value::Nil),
        },
    };
    for functor in [scored, named] {
        if let Err(e) = gisp.defun("level", Rc::new(functor)) {
            eprintln!("Error: {}", e);
            return;
        }
    }

    let cases = [
        ("(+ 1 2 3)", "Addition"),
        ("thresholds[1:3]", "Settings slice"),
        ("(var readings (list 5 42 77 95))", "Define a list"),
        ("readings[-1]", "Negative index"),
        ("readings[0:4:2]", "Stepped slice"),
        ("(set readings[0] 60)", "In-place write"),
        ("(level readings[0])", "Overload on int"),
        ("(level (level readings[3]))", "Overload on string"),
        ("(var n::int \"oops\")", "Typed slot rejects a string"),
        ("labels[\"none\"]", "Missing key"),
    ];

    for (source, description) in cases {
        println!("--- {} ---", description);
        println!("Source: {}", source);
        match gisp.parse(source) {
            Ok(result) => println!("Result: {}", result),
            Err(e) => println!("Error:  {}", e),
        }
        println!();
    }

    println!("=== Demo Complete ===");
}
