use core::fmt::Write;
use std::{collections::HashMap, env, fmt, fs, path::PathBuf};

const DOC_TABLE_HEADER: &str = r#"
| Name | Description | Default value | Allowed value |
|------|-------------|---------------|---------------|
"#;
const SELECTED_TABLE_HEADER: &str = r#"
| Name | Selected value |
|------|----------------|
"#;

/// An error found while parsing or validating a configuration value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// The value could not be parsed as the option's type.
    Parse(String),
    /// The value parsed but was rejected by the option's validator.
    Validation(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Parse(msg) => write!(f, "parse error: {msg}"),
            Error::Validation(msg) => write!(f, "validation error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

/// Supported configuration value types.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    /// Unsigned integers, wide enough for rates in Hz.
    Integer(u64),
}

impl Value {
    fn parse_in_place(&mut self, s: &str) -> Result<(), Error> {
        *self = match self {
            Value::Integer(_) => {
                let s = s.replace('_', "");
                let inner = match s.as_bytes() {
                    [b'0', b'x', ..] => u64::from_str_radix(&s[2..], 16),
                    [b'0', b'o', ..] => u64::from_str_radix(&s[2..], 8),
                    [b'0', b'b', ..] => u64::from_str_radix(&s[2..], 2),
                    _ => s.parse::<u64>(),
                }
                .map_err(|_| Error::Parse(format!("Expected an unsigned integer, found: '{s}'")))?;

                Value::Integer(inner)
            }
        };

        Ok(())
    }

    /// Convert the value to an integer.
    pub fn as_integer(&self) -> u64 {
        match self {
            Value::Integer(value) => *value,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{i}"),
        }
    }
}

/// Configuration value validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Validator {
    /// Only allow integers greater than 0.
    PositiveInteger,
}

impl Validator {
    fn validate(&self, value: &Value) -> Result<(), Error> {
        let value = value.as_integer();

        match self {
            Validator::PositiveInteger if value == 0 => Err(Error::Validation(format!(
                "Expected a positive integer, found: {value}"
            ))),
            Validator::PositiveInteger => Ok(()),
        }
    }

    fn description(&self) -> String {
        match self {
            Validator::PositiveInteger => String::from("Positive integer"),
        }
    }
}

/// A configuration option of a crate.
#[derive(Clone, Debug)]
pub struct ConfigOption {
    /// The name of the option, without the crate prefix.
    pub name: &'static str,
    /// Human readable description, used in the generated table.
    pub description: &'static str,
    /// Value used when no environment variable overrides it.
    pub default_value: Value,
    /// Optional constraint checked against the selected value.
    pub constraint: Option<Validator>,
}

/// Generate and parse config from a prefix and a list of options.
///
/// Environment variables named `{PREFIX}_CONFIG_{NAME}` override the
/// defaults. Every selected value is emitted as a `rustc-env` variable so the
/// crate can read it with [crate::soc_config_int].
///
/// Passing `true` for `emit_md_tables` writes a markdown table of the
/// available and of the selected options to `OUT_DIR`.
///
/// Unknown keys with the given prefix, unparsable values and values rejected
/// by a validator cause this function to panic, failing the build.
pub fn generate_config(
    crate_name: &str,
    config: &[ConfigOption],
    emit_md_tables: bool,
) -> HashMap<String, Value> {
    println!("cargo:rerun-if-changed=build.rs");

    let prefix = format!("{}_CONFIG_", screaming_snake_case(crate_name));
    let mut doc_table = String::from(DOC_TABLE_HEADER);
    let mut selected_config = String::from(SELECTED_TABLE_HEADER);

    let mut configs = create_config(&prefix, config, &mut doc_table);
    capture_from_env(&prefix, &mut configs);
    validate_config(&prefix, config, &configs);
    emit_configuration(&configs, &mut selected_config);

    if emit_md_tables {
        write_config_tables(&snake_case(crate_name), doc_table, selected_config);
    }

    configs
}

fn create_config(
    prefix: &str,
    config: &[ConfigOption],
    doc_table: &mut String,
) -> HashMap<String, Value> {
    let mut configs = HashMap::new();

    for option in config {
        let name = format!("{prefix}{}", screaming_snake_case(option.name));
        configs.insert(name.clone(), option.default_value.clone());

        let allowed = option
            .constraint
            .as_ref()
            .map(Validator::description)
            .unwrap_or_default();
        writeln!(
            doc_table,
            "|**{name}**|{}|{}|{allowed}",
            option.description, option.default_value
        )
        .ok();

        println!("cargo:rerun-if-env-changed={name}");
    }

    configs
}

fn capture_from_env(prefix: &str, configs: &mut HashMap<String, Value>) {
    let mut unknown = Vec::new();
    let mut failed = Vec::new();

    for (var, value) in env::vars() {
        if var.starts_with(prefix) {
            let Some(cfg) = configs.get_mut(&var) else {
                unknown.push(var);
                continue;
            };

            if let Err(e) = cfg.parse_in_place(&value) {
                failed.push(format!("{var}: {e}"));
            }
        }
    }

    if !failed.is_empty() {
        panic!("Invalid configuration options detected: {failed:?}");
    }

    if !unknown.is_empty() {
        panic!("Unknown configuration options detected: {unknown:?}");
    }
}

fn validate_config(prefix: &str, config: &[ConfigOption], configs: &HashMap<String, Value>) {
    for option in config {
        let name = format!("{prefix}{}", screaming_snake_case(option.name));
        let Some(validator) = &option.constraint else {
            continue;
        };

        if let Err(e) = validator.validate(&configs[&name]) {
            panic!("Invalid configuration value for {name}: {e}");
        }
    }
}

fn emit_configuration(configs: &HashMap<String, Value>, selected_config: &mut String) {
    let mut names: Vec<_> = configs.keys().collect();
    names.sort();

    for name in names {
        let value = &configs[name];
        println!("cargo:rustc-env={name}={value}");

        writeln!(selected_config, "|**{name}**|{value}|").ok();
    }
}

fn write_config_tables(file_name: &str, doc_table: String, selected_config: String) {
    let Some(out_dir) = env::var_os("OUT_DIR").map(PathBuf::from) else {
        panic!("OUT_DIR is not set, generate_config must be called from a build script");
    };

    let out_file = out_dir.join(format!("{file_name}_config_table.md"));
    if let Err(e) = fs::write(&out_file, doc_table) {
        panic!("Failed to write {}: {e}", out_file.display());
    }

    let out_file = out_dir.join(format!("{file_name}_selected_config.md"));
    if let Err(e) = fs::write(&out_file, selected_config) {
        panic!("Failed to write {}: {e}", out_file.display());
    }
}

// Converts a symbol name like
// "TURBO-threshold_HZ"
// to
// "turbo_threshold_hz"
fn snake_case(name: &str) -> String {
    let mut name = name.replace('-', "_");
    name.make_ascii_lowercase();
    name
}

// Converts a symbol name like
// "turbo-threshold_hz"
// to
// "TURBO_THRESHOLD_HZ"
fn screaming_snake_case(name: &str) -> String {
    let mut name = name.replace('-', "_");
    name.make_ascii_uppercase();
    name
}

#[cfg(test)]
mod test {
    use super::*;

    fn rate_option(name: &'static str, default: u64) -> ConfigOption {
        ConfigOption {
            name,
            description: "NA",
            default_value: Value::Integer(default),
            constraint: Some(Validator::PositiveInteger),
        }
    }

    #[test]
    fn value_number_formats() {
        const INPUTS: &[&str] = &["0xAA", "0o252", "0b0000000010101010", "170", "1_70"];
        let mut v = Value::Integer(0);

        for input in INPUTS {
            v.parse_in_place(input).unwrap();
            // no matter the input format, the output format should be decimal
            assert_eq!(v.to_string(), "170");
        }
    }

    #[test]
    fn value_rejects_non_numbers() {
        let mut v = Value::Integer(7);

        v.parse_in_place("0xzz").expect_err("not a hex number");
        v.parse_in_place("-1").expect_err("rates are unsigned");
        assert_eq!(v.as_integer(), 7);
    }

    #[test]
    fn env_override() {
        temp_env::with_vars(
            [("SOC_TEST_CONFIG_STABLE_RATE_HZ", Some("1_000_000_000"))],
            || {
                let configs = generate_config(
                    "soc-test",
                    &[
                        rate_option("stable-rate-hz", 1_200_000_000),
                        rate_option("turbo_threshold_hz", 1_600_000_000),
                    ],
                    false,
                );

                // overridden
                assert_eq!(
                    configs["SOC_TEST_CONFIG_STABLE_RATE_HZ"],
                    Value::Integer(1_000_000_000)
                );
                // default
                assert_eq!(
                    configs["SOC_TEST_CONFIG_TURBO_THRESHOLD_HZ"].as_integer(),
                    1_600_000_000
                );
            },
        )
    }

    #[test]
    #[should_panic(expected = "Unknown configuration options")]
    fn env_unknown_bails() {
        temp_env::with_vars(
            [
                ("SOC_TEST_CONFIG_STABLE_RATE_HZ", Some("0xaa")),
                ("SOC_TEST_CONFIG_RANDOM_VARIABLE", Some("")),
            ],
            || {
                generate_config("soc-test", &[rate_option("stable_rate_hz", 1)], false);
            },
        );
    }

    #[test]
    #[should_panic(expected = "Invalid configuration options")]
    fn env_invalid_values_bails() {
        temp_env::with_vars([("SOC_TEST_CONFIG_STABLE_RATE_HZ", Some("fast"))], || {
            generate_config("soc-test", &[rate_option("stable_rate_hz", 1)], false);
        });
    }

    #[test]
    #[should_panic(expected = "Invalid configuration value")]
    fn validator_rejects_zero() {
        temp_env::with_vars([("SOC_TEST_CONFIG_STABLE_RATE_HZ", Some("0"))], || {
            generate_config("soc-test", &[rate_option("stable_rate_hz", 1)], false);
        });
    }

    #[test]
    fn positive_validator() {
        let v = Validator::PositiveInteger;

        assert!(v.validate(&Value::Integer(1)).is_ok());
        assert!(v.validate(&Value::Integer(0)).is_err());
        assert_eq!(v.description(), "Positive integer");
    }
}
