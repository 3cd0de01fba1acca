use std::{env, process};

use featureflags_rust_sdk::{Config, User};

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() != 2 {
        eprintln!("Please pass an SDK key as the first argument");
        process::exit(1);
    }
    let sdk_key = &args[1];

    let client = featureflags_rust_sdk::Client::new(sdk_key.clone(), Config::default())
        .await
        .expect("failed to start client");

    let user = User::new("example-user");
    let value = client.variation("my-flag", Some(&user), serde_json::json!(false));
    dbg!(value);

    client.close().await;
}
