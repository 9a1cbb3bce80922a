use std::fs;

fn main() {
    // Validate the sample config at compile time
    let config_path = "src/default_config.yaml";
    println!("cargo:rerun-if-changed={}", config_path);

    let content = fs::read_to_string(config_path).expect("Failed to read default_config.yaml");

    if let Err(e) = serde_yaml::from_str::<serde_yaml::Value>(&content) {
        panic!("Invalid default_config.yaml: {}", e);
    }
}
