//! Encode and decode GATT characteristic values from the command line.
//!
//! Usage:
//!   gattpacket [--schema FILE]... decode <ID> <HEX>
//!   gattpacket [--schema FILE]... encode <ID> name=value ...
//!   gattpacket [--schema FILE]... list
//!
//! `--schema` loads an extra schema file on top of the built-in table (repeatable).
//! Log output goes to stderr and is controlled by `RUST_LOG` (default `warn`,
//! `--verbose` / `-v` raises it to `debug`).

use anyhow::{anyhow, bail, Context};
use gattpacket::dump::{decoded_to_dump, hex_string, parse_hex};
use gattpacket::{CharId, CharSchema, FieldType, GattCodec, Value, ValueObject};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_logging(level: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn usage() -> anyhow::Error {
    anyhow!(
        "usage: gattpacket [--schema FILE]... (decode <ID> <HEX> | encode <ID> name=value ... | list)"
    )
}

fn parse_int(s: &str) -> Option<i128> {
    let (neg, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let n = match body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        Some(hex) => i128::from_str_radix(hex, 16).ok()?,
        None => body.parse::<i128>().ok()?,
    };
    Some(if neg { -n } else { n })
}

fn int_value(s: &str) -> anyhow::Result<Value> {
    let n = parse_int(s).ok_or_else(|| anyhow!("not an integer: {:?}", s))?;
    if n >= 0 {
        u64::try_from(n).map(Value::U64).map_err(|_| anyhow!("integer too large: {}", s))
    } else {
        i64::try_from(n).map(Value::I64).map_err(|_| anyhow!("integer too small: {}", s))
    }
}

/// Interpret `raw` according to the wire type of the field it is assigned to.
fn parse_value(ty: FieldType, element: Option<FieldType>, raw: &str) -> anyhow::Result<Value> {
    let v = match ty {
        FieldType::SFloat
        | FieldType::Float
        | FieldType::Float32Le
        | FieldType::Float64Le
        | FieldType::Float32Be
        | FieldType::Float64Be => {
            Value::Float(raw.parse::<f64>().with_context(|| format!("not a number: {:?}", raw))?)
        }
        FieldType::Boolean => match raw {
            "true" | "1" => Value::Bool(true),
            "false" | "0" => Value::Bool(false),
            _ => bail!("not a boolean: {:?}", raw),
        },
        FieldType::String | FieldType::StringPreLenU8 | FieldType::Uuid | FieldType::Addr(_) => {
            Value::Str(raw.to_string())
        }
        FieldType::Buffer | FieldType::Variable | FieldType::BufferPreLenU8 => {
            Value::Bytes(parse_hex(raw).map_err(|e| anyhow!(e))?)
        }
        FieldType::List => {
            let elem = element.ok_or_else(|| anyhow!("list field without element type"))?;
            let items = raw
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(|s| parse_value(elem, None, s.trim()))
                .collect::<anyhow::Result<Vec<_>>>()?;
            Value::List(items)
        }
        _ => int_value(raw)?,
    };
    Ok(v)
}

fn build_values(schema: &CharSchema, assignments: &[String]) -> anyhow::Result<ValueObject> {
    let mut values = ValueObject::new();
    for a in assignments {
        let (name, raw) = a
            .split_once('=')
            .ok_or_else(|| anyhow!("expected name=value, got {:?}", a))?;
        let ty = schema
            .field_type(name)
            .ok_or_else(|| anyhow!("unknown field {:?}", name))?;
        let element = schema.element.map(|e| e.ty());
        values.insert(name.to_string(), parse_value(ty, element, raw)?);
    }
    Ok(values)
}

fn schema_for(codec: &GattCodec, id: &CharId) -> anyhow::Result<std::sync::Arc<CharSchema>> {
    codec
        .lookup_schema(id)
        .ok_or_else(|| anyhow!("unknown characteristic {}", id))
}

fn main() -> anyhow::Result<()> {
    let mut raw_args: Vec<String> = std::env::args().skip(1).collect();
    let verbose = if let Some(pos) = raw_args.iter().position(|a| a == "--verbose" || a == "-v") {
        raw_args.remove(pos);
        true
    } else {
        false
    };
    let mut schema_files: Vec<PathBuf> = Vec::new();
    while let Some(pos) = raw_args.iter().position(|a| a == "--schema") {
        raw_args.remove(pos);
        if pos >= raw_args.len() {
            bail!("--schema needs a file argument");
        }
        schema_files.push(PathBuf::from(raw_args.remove(pos)));
    }
    init_logging(if verbose { "debug" } else { "warn" });

    let mut codec = GattCodec::with_builtin()?;
    for path in &schema_files {
        let n = codec
            .load_schemas(path)
            .with_context(|| format!("loading {}", path.display()))?;
        tracing::info!(path = %path.display(), schemas = n, "schema file loaded");
    }

    let mut args = raw_args.into_iter();
    match args.next().as_deref() {
        Some("decode") => {
            let id = CharId::from(args.next().ok_or_else(usage)?);
            let hex = args.collect::<Vec<_>>().join("");
            let bytes = parse_hex(&hex).map_err(|e| anyhow!(e))?;
            let schema = schema_for(&codec, &id)?;
            let decoded = codec.decode(&id, &bytes)?;
            match schema.name.as_deref() {
                Some(name) => println!("{} ({})", id, name),
                None => println!("{}", id),
            }
            println!("{}", decoded_to_dump(&schema, &decoded));
        }
        Some("encode") => {
            let id = CharId::from(args.next().ok_or_else(usage)?);
            let schema = schema_for(&codec, &id)?;
            let values = build_values(&schema, &args.collect::<Vec<_>>())?;
            let bytes = codec.encode(&id, &values)?;
            println!("{}", hex_string(&bytes));
        }
        Some("list") => {
            let registry = codec.registry();
            for id in registry.ids() {
                let name = registry
                    .get(id)
                    .and_then(|s| s.name.clone())
                    .unwrap_or_default();
                println!("{:<8} {}", id.as_str(), name);
            }
        }
        _ => return Err(usage()),
    }
    Ok(())
}
