use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, COOKIE, SET_COOKIE};
use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;

#[derive(Parser)]
#[command(name = "guard-cli")]
#[command(about = "Exercise a running request guard from the command line", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Token endpoint path
    #[arg(long, default_value = "/api/csrf-token")]
    token_path: String,

    /// Principal header to send, as NAME:VALUE
    #[arg(long)]
    principal: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a CSRF token
    Token,
    /// Fetch a token, then send a protected request with it
    Submit {
        #[arg(short, long, default_value = "POST")]
        method: String,
        #[arg(short, long)]
        path: String,
        /// JSON body
        #[arg(short, long)]
        data: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    csrf_token: String,
    cookie_name: String,
    header_name: String,
}

struct Fetched {
    token: TokenResponse,
    cookie: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base_headers = principal_headers(cli.principal.as_deref())?;

    match cli.command {
        Commands::Token => {
            let fetched = fetch_token(&client, &cli.url, &cli.token_path, &base_headers).await?;
            println!("token:  {}", fetched.token.csrf_token);
            println!("header: {}", fetched.token.header_name);
            println!("cookie: {}", fetched.token.cookie_name);
        }
        Commands::Submit { method, path, data } => {
            let fetched = fetch_token(&client, &cli.url, &cli.token_path, &base_headers).await?;

            let mut headers = base_headers.clone();
            headers.insert(
                HeaderName::from_bytes(fetched.token.header_name.as_bytes())?,
                HeaderValue::from_str(&fetched.token.csrf_token)?,
            );
            if let Some(cookie) = &fetched.cookie {
                headers.insert(COOKIE, HeaderValue::from_str(cookie)?);
            }

            let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())?;
            let mut request = client
                .request(method, format!("{}{}", cli.url, path))
                .headers(headers);
            if let Some(data) = data {
                request = request.header(CONTENT_TYPE, "application/json").body(data);
            }
            print_response(request.send().await?).await?;
        }
    }

    Ok(())
}

fn principal_headers(principal: Option<&str>) -> Result<HeaderMap, Box<dyn std::error::Error>> {
    let mut headers = HeaderMap::new();
    if let Some(principal) = principal {
        let (name, value) = principal
            .split_once(':')
            .ok_or("principal must be NAME:VALUE")?;
        headers.insert(
            HeaderName::from_bytes(name.trim().as_bytes())?,
            HeaderValue::from_str(value.trim())?,
        );
    }
    Ok(headers)
}

async fn fetch_token(
    client: &reqwest::Client,
    url: &str,
    path: &str,
    headers: &HeaderMap,
) -> Result<Fetched, Box<dyn std::error::Error>> {
    let res = client
        .get(format!("{}{}", url, path))
        .headers(headers.clone())
        .send()
        .await?;
    if !res.status().is_success() {
        return Err(format!("token endpoint returned status {}", res.status()).into());
    }

    // name=value of the first Set-Cookie, enough to echo back
    let cookie = res
        .headers()
        .get(SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.to_string());
    let token = res.json::<TokenResponse>().await?;
    Ok(Fetched { token, cookie })
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    println!("status: {}", status);
    let text = res.text().await?;
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}
