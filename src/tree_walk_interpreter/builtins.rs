use std::cmp::Ordering;

use rand::Rng;
use rustc_hash::FxHashMap;

use super::{
    callable::{Callable, NativeFn},
    native_tools, ExecutionErrorKind, Interpreter, Value,
};

pub fn register(functions: &mut FxHashMap<String, Callable>) {
    define(functions, "longueur", longueur);
    define(functions, "aleatoire", aleatoire);
    define(functions, "entre", entre);
    define(functions, "min", min);
    define(functions, "max", max);
    define(functions, "croissant", croissant);
    define(functions, "decroissant", decroissant);
    define(functions, "lire", lire);
    define(functions, "ecrire", ecrire);
    define(functions, "date", date);
    define(functions, "execute", native_tools::execute);
    define(functions, "scan_ports", native_tools::scan_ports);
    define(functions, "requete_http", native_tools::requete_http);
    define(functions, "dirbuster", native_tools::dirbuster);
    define(functions, "dns_resolve", native_tools::dns_resolve);
    define(functions, "dns_bruteforce", native_tools::dns_bruteforce);
    define(functions, "subnet_scan", native_tools::subnet_scan);
}

fn define(functions: &mut FxHashMap<String, Callable>, name: &'static str, function: NativeFn) {
    functions.insert(name.to_string(), Callable::Builtin { name, function });
}

/// Argument `i` as text; absent arguments read as `null`.
pub(super) fn string_arg(args: &[Value], i: usize) -> String {
    args.get(i).unwrap_or(&Value::Null).to_key()
}

/// Argument `i` when truthy, otherwise `default`.
fn number_or(args: &[Value], i: usize, default: f64) -> f64 {
    match args.get(i) {
        Some(Value::Number(n)) if *n != 0.0 && !n.is_nan() => *n,
        _ => default,
    }
}

fn longueur(_: &mut Interpreter, args: Vec<Value>) -> Result<Value, ExecutionErrorKind> {
    let length = match args.first() {
        Some(Value::List(items)) => items.borrow().len(),
        Some(Value::String(s)) => s.chars().count(),
        _ => 0,
    };
    Ok(Value::Number(length as f64))
}

fn aleatoire(_: &mut Interpreter, args: Vec<Value>) -> Result<Value, ExecutionErrorKind> {
    let min = number_or(&args, 0, 0.0);
    let max = number_or(&args, 1, 100.0);
    let roll: f64 = rand::thread_rng().gen();
    Ok(Value::Number((roll * (max - min + 1.0)).floor() + min))
}

fn entre(interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, ExecutionErrorKind> {
    if let Some(prompt) = args.first() {
        let mut stdout = interpreter.stdout.borrow_mut();
        write!(stdout, "{}", prompt)?;
        stdout.flush()?;
    }

    let mut line = String::new();
    if interpreter.stdin.borrow_mut().read_line(&mut line)? == 0 {
        return Ok(Value::Null);
    }
    let trimmed = line.trim_end_matches(['\n', '\r']).len();
    line.truncate(trimmed);
    Ok(Value::String(line))
}

/// The numbers of a non-empty all-number list.
fn numbers(args: &[Value]) -> Option<Vec<f64>> {
    let Some(Value::List(items)) = args.first() else {
        return None;
    };
    let items = items.borrow();
    if items.is_empty() {
        return None;
    }
    items
        .iter()
        .map(|item| match item {
            Value::Number(n) => Some(*n),
            _ => None,
        })
        .collect()
}

fn min(_: &mut Interpreter, args: Vec<Value>) -> Result<Value, ExecutionErrorKind> {
    Ok(numbers(&args)
        .map(|ns| Value::Number(ns.into_iter().fold(f64::INFINITY, f64::min)))
        .unwrap_or(Value::Null))
}

fn max(_: &mut Interpreter, args: Vec<Value>) -> Result<Value, ExecutionErrorKind> {
    Ok(numbers(&args)
        .map(|ns| Value::Number(ns.into_iter().fold(f64::NEG_INFINITY, f64::max)))
        .unwrap_or(Value::Null))
}

fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        _ => Ordering::Equal,
    }
}

fn sorted(args: Vec<Value>, descending: bool) -> Value {
    match args.into_iter().next() {
        Some(Value::List(items)) => {
            let mut copy = items.borrow().clone();
            if descending {
                copy.sort_by(|a, b| compare(b, a));
            } else {
                copy.sort_by(compare);
            }
            Value::list(copy)
        }
        Some(other) => other,
        None => Value::Null,
    }
}

fn croissant(_: &mut Interpreter, args: Vec<Value>) -> Result<Value, ExecutionErrorKind> {
    Ok(sorted(args, false))
}

fn decroissant(_: &mut Interpreter, args: Vec<Value>) -> Result<Value, ExecutionErrorKind> {
    Ok(sorted(args, true))
}

fn lire(_: &mut Interpreter, args: Vec<Value>) -> Result<Value, ExecutionErrorKind> {
    let path = string_arg(&args, 0);
    std::fs::read_to_string(&path)
        .map(Value::String)
        .map_err(|source| ExecutionErrorKind::Read { path, source })
}

fn ecrire(_: &mut Interpreter, args: Vec<Value>) -> Result<Value, ExecutionErrorKind> {
    let path = string_arg(&args, 0);
    let contents = string_arg(&args, 1);
    Ok(match std::fs::write(&path, contents) {
        Ok(()) => Value::Boolean(true),
        Err(e) => Value::error_object(e.to_string()),
    })
}

fn date(_: &mut Interpreter, _: Vec<Value>) -> Result<Value, ExecutionErrorKind> {
    Ok(Value::String(
        chrono::Local::now().format("%d/%m/%Y %H:%M:%S").to_string(),
    ))
}

#[cfg(test)]
mod test {
    use super::*;

    fn list_of(values: &[f64]) -> Value {
        Value::list(values.iter().copied().map(Value::Number).collect())
    }

    #[test]
    fn test_sorting_returns_new_list() {
        let original = list_of(&[3.0, 1.0, 2.0]);
        let ascending = sorted(vec![original.clone()], false);
        let descending = sorted(vec![original.clone()], true);

        assert_eq!(ascending.to_string(), "[1, 2, 3]");
        assert_eq!(descending.to_string(), "[3, 2, 1]");
        assert_eq!(original.to_string(), "[3, 1, 2]");
    }

    #[test]
    fn test_sorting_non_list_is_identity() {
        assert_eq!(sorted(vec![Value::Number(4.0)], false).to_string(), "4");
    }

    #[test]
    fn test_number_or_falls_back_on_falsy() {
        assert_eq!(number_or(&[Value::Number(0.0)], 0, 100.0), 100.0);
        assert_eq!(number_or(&[Value::Number(7.0)], 0, 100.0), 7.0);
        assert_eq!(number_or(&[], 1, 2.0), 2.0);
    }
}
