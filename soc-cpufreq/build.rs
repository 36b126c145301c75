use soc_config::{generate_config, ConfigOption, Validator, Value};

fn main() {
    // emit config
    generate_config(
        "soc-cpufreq",
        &[
            ConfigOption {
                name: "turbo-threshold-hz",
                description: "CPU frequency, in Hz, from which on operating points count as turbo. \
                              Moving between two turbo points passes through the stable rate.",
                default_value: Value::Integer(1_600_000_000),
                constraint: Some(Validator::PositiveInteger),
            },
            ConfigOption {
                name: "stable-rate-hz",
                description: "Intermediate rate, in Hz, the cluster clock is set to between two \
                              turbo operating points.",
                default_value: Value::Integer(1_200_000_000),
                constraint: Some(Validator::PositiveInteger),
            },
        ],
        true,
    );
}
