use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::Args;
use color_eyre::eyre::{OptionExt, Result, WrapErr, eyre};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, info};

pub const READONLY_SCOPE: &str = "https://www.googleapis.com/auth/youtube.readonly";
pub const MANAGE_SCOPE: &str = "https://www.googleapis.com/auth/youtube";

pub const SOURCE_TOKEN: &str = "./session/token_old_account.json";
pub const DESTINATION_TOKEN: &str = "./session/token_new_account.json";

/// Seconds before expiry at which a token is already treated as expired.
const EXPIRY_MARGIN: u64 = 60;

#[derive(Args, Debug, Clone)]
pub struct AuthArgs {
    /// OAuth client secret downloaded from the Google Cloud console
    #[arg(long, env = "TUBE_MOVER_CLIENT_SECRET", default_value = "./session/client_secret.json")]
    pub client_secret: PathBuf,

    /// Cached OAuth token of the account, defaults to one file per pass
    #[arg(long)]
    pub token: Option<PathBuf>,

    /// Ignore the cached token and go through the consent screen again
    #[arg(long, default_value = "false")]
    pub clear_cache: bool,
}

#[derive(Deserialize, Debug)]
struct ClientSecretFile {
    installed: Option<ClientSecret>,
    web: Option<ClientSecret>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ClientSecret {
    pub client_id: String,
    pub client_secret: String,
    pub auth_uri: String,
    pub token_uri: String,
}

impl ClientSecret {
    pub fn load(path: &Path) -> Result<Self> {
        let reader = std::fs::File::open(path)
            .wrap_err_with(|| format!("missing client secret file {:?}", path))?;
        let file: ClientSecretFile = serde_json::from_reader(reader)?;
        file.installed
            .or(file.web)
            .ok_or_eyre("client secret has neither an `installed` nor a `web` section")
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct OAuthToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Unix timestamp in seconds
    pub expires_at: u64,
    pub scope: Option<String>,
    pub token_type: String,
}

#[derive(Deserialize, Debug)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
    refresh_token: Option<String>,
    scope: Option<String>,
    token_type: String,
}

impl OAuthToken {
    fn from_response(res: TokenResponse, now: u64, previous_refresh: Option<String>) -> Self {
        Self {
            access_token: res.access_token,
            // refresh responses usually omit the refresh token
            refresh_token: res.refresh_token.or(previous_refresh),
            expires_at: now + res.expires_in,
            scope: res.scope,
            token_type: res.token_type,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let reader = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::File::create(path)?;
        serde_json::to_writer(&mut file, self)?;
        Ok(())
    }

    pub fn is_expired(&self, now: u64) -> bool {
        now + EXPIRY_MARGIN >= self.expires_at
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        match &self.scope {
            Some(s) => s.split_whitespace().any(|granted| granted == scope),
            // tokens saved without scope information are trusted
            None => true,
        }
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Returns a valid token for `scope`, refreshing or asking for consent when needed.
///
/// The resulting token is written back to the token path.
pub async fn authenticate(args: &AuthArgs, default_token: &str, scope: &str) -> Result<OAuthToken> {
    let token_path = args
        .token
        .clone()
        .unwrap_or_else(|| PathBuf::from(default_token));
    let secret = ClientSecret::load(&args.client_secret)?;
    let client = reqwest::Client::new();

    let cached = if token_path.exists() && !args.clear_cache {
        Some(OAuthToken::load(&token_path).wrap_err("invalid cached token")?)
    } else {
        None
    };

    let now = now_secs();
    let token = match cached {
        Some(token) if !token.is_expired(now) && token.has_scope(scope) => {
            debug!("using cached token from {:?}", token_path);
            token
        }
        Some(OAuthToken {
            refresh_token: Some(refresh_token),
            scope: granted,
            ..
        }) if granted.as_deref().is_none_or(|g| g.split_whitespace().any(|s| s == scope)) => {
            info!("refreshing token");
            refresh_token_request(&client, &secret, refresh_token).await?
        }
        _ => {
            info!("requesting new token");
            request_token(&client, &secret, scope).await?
        }
    };

    token.save(&token_path)?;
    info!("authentication successful");
    Ok(token)
}

async fn refresh_token_request(
    client: &reqwest::Client,
    secret: &ClientSecret,
    refresh_token: String,
) -> Result<OAuthToken> {
    let params = [
        ("client_id", secret.client_id.as_str()),
        ("client_secret", secret.client_secret.as_str()),
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token.as_str()),
    ];
    let res = client.post(&secret.token_uri).form(&params).send().await?;
    let res = res.error_for_status()?;
    let res: TokenResponse = res.json().await?;
    Ok(OAuthToken::from_response(res, now_secs(), Some(refresh_token)))
}

async fn request_token(
    client: &reqwest::Client,
    secret: &ClientSecret,
    scope: &str,
) -> Result<OAuthToken> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let redirect_uri = format!("http://127.0.0.1:{}", listener.local_addr()?.port());
    let auth_url = build_authorization_url(secret, &redirect_uri, scope)?;

    info!("please authorize the app in your browser: {}", auth_url);
    if let Err(e) = webbrowser::open(&auth_url) {
        debug!("could not open a browser: {}", e);
    }
    let code = listen_for_code(&listener).await?;

    let params = [
        ("code", code.as_str()),
        ("client_id", secret.client_id.as_str()),
        ("client_secret", secret.client_secret.as_str()),
        ("redirect_uri", redirect_uri.as_str()),
        ("grant_type", "authorization_code"),
    ];
    let res = client.post(&secret.token_uri).form(&params).send().await?;
    let res = res.error_for_status()?;
    let res: TokenResponse = res.json().await?;
    Ok(OAuthToken::from_response(res, now_secs(), None))
}

fn build_authorization_url(secret: &ClientSecret, redirect_uri: &str, scope: &str) -> Result<String> {
    let params = [
        ("response_type", "code"),
        ("client_id", secret.client_id.as_str()),
        ("redirect_uri", redirect_uri),
        ("scope", scope),
        ("access_type", "offline"),
        ("prompt", "consent"),
    ];
    Ok(reqwest::Url::parse_with_params(&secret.auth_uri, params)?.to_string())
}

async fn listen_for_code(listener: &TcpListener) -> Result<String> {
    let (mut socket, _) = listener.accept().await?;
    let mut buffer = [0; 4096];
    let n = socket.read(&mut buffer).await?;
    let request = String::from_utf8_lossy(&buffer[..n]);
    let code = parse_callback(&request);

    let body = if code.is_ok() {
        "Authorization complete, you can close this tab."
    } else {
        "Authorization failed, see the console output."
    };
    let response = format!(
        "HTTP/1.1 200 OK\r\ncontent-type: text/plain\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    socket.write_all(response.as_bytes()).await?;
    code
}

/// Extracts the authorization code from the raw redirect request.
fn parse_callback(request: &str) -> Result<String> {
    let path = request
        .split_whitespace()
        .nth(1)
        .ok_or_eyre("invalid OAuth callback request")?;
    let url = reqwest::Url::parse(&format!("http://127.0.0.1{}", path))?;
    if let Some((_, error)) = url.query_pairs().find(|(k, _)| k == "error") {
        return Err(eyre!("authorization denied: {}", error));
    }
    let code = url
        .query_pairs()
        .find(|(k, _)| k == "code")
        .ok_or_eyre("Google returned no authorization code")?
        .1
        .to_string();
    Ok(code)
}
