use std::error::Error;
use std::path::PathBuf;

use log::info;
use reqwest::blocking::{multipart, Client};
use serde_json::Value;
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(
    name = "waste-classify",
    about = "Send a photo to a running waste classification service"
)]
struct CmdArgs {
    #[structopt(help = "Path to the image file to classify", parse(from_os_str))]
    image_path: PathBuf,

    #[structopt(
        long,
        default_value = "http://localhost:5000/api/classify",
        help = "URL of the classification API endpoint"
    )]
    url: String,

    #[structopt(
        long,
        default_value = "en",
        possible_values = &["en", "id"],
        help = "Language for the response"
    )]
    lang: String,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = CmdArgs::from_args();

    if !args.image_path.is_file() {
        return Err(format!("Image not found at {}", args.image_path.display()).into());
    }

    let form = multipart::Form::new().file("image", &args.image_path)?;

    info!("Sending image {} to {}", args.image_path.display(), args.url);

    let response = Client::new()
        .post(&args.url)
        .query(&[("lang", args.lang.as_str())])
        .multipart(form)
        .send()?;

    let status = response.status();
    if !status.is_success() {
        println!("Error: API request failed with status code {}", status.as_u16());
        println!("{}", response.text()?);
        return Ok(());
    }

    let result: Value = response.json()?;

    println!("Classification successful!");
    println!("\nAPI Response:");
    println!("{}", serde_json::to_string_pretty(&result)?);

    if result["success"].as_bool().unwrap_or(false) {
        let data = &result["data"];
        println!(
            "\nSubcategory: {}",
            data["subcategory"].as_str().unwrap_or("N/A")
        );
        println!(
            "Main Category: {}",
            data["main_category"].as_str().unwrap_or("N/A")
        );
        println!(
            "Confidence: {:.4}",
            data["confidence"].as_f64().unwrap_or(0.0)
        );
    } else {
        println!(
            "\nError: {}",
            result["error"].as_str().unwrap_or("Unknown error")
        );
    }

    Ok(())
}
