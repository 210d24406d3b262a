pub mod model;
mod response;

use response::api_error;

use async_trait::async_trait;
use color_eyre::eyre::Result;
use reqwest::Response;
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use self::model::{
    YoutubeInsertResponse, YoutubeListResponse, YoutubePlaylistItemResponse,
    YoutubePlaylistResponse,
};
use crate::ConfigArgs;
use crate::auth::{self, AuthArgs, OAuthToken};
use crate::video_api::{Page, Playlist, PlaylistItem, Privacy, VideoApi};

/// Client of the YouTube Data API v3 for the authenticated account.
pub struct YoutubeApi {
    client: reqwest::Client,
    debug: bool,
}

#[derive(Debug)]
enum HttpMethod<'a> {
    Get,
    Post(Option<&'a serde_json::Value>),
}

impl YoutubeApi {
    const BASE_API: &'static str = "https://www.googleapis.com/youtube/v3";

    pub fn new(token: &OAuthToken, config: &ConfigArgs) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", token.bearer().parse()?);
        headers.insert("Accept", "application/json".parse()?);

        let mut client = reqwest::Client::builder().default_headers(headers);
        if let Some(proxy) = &config.proxy {
            client = client
                .proxy(reqwest::Proxy::all(proxy)?)
                .danger_accept_invalid_certs(true)
        }
        let client = client.build()?;

        Ok(Self {
            client,
            debug: config.debug,
        })
    }

    /// Authenticates against the account behind `default_token` and builds a client.
    pub async fn connect(
        auth_args: &AuthArgs,
        default_token: &str,
        scope: &str,
        config: &ConfigArgs,
    ) -> Result<Self> {
        let token = auth::authenticate(auth_args, default_token, scope).await?;
        Self::new(&token, config)
    }

    fn build_endpoint(&self, path: &str) -> String {
        format!("{}{}", Self::BASE_API, path)
    }

    async fn make_request(
        &self,
        path: &str,
        method: &HttpMethod<'_>,
        query: &[(&str, &str)],
    ) -> Result<Response> {
        let endpoint = self.build_endpoint(path);
        let request = match method {
            HttpMethod::Get => self.client.get(endpoint),
            HttpMethod::Post(Some(b)) => self.client.post(endpoint).json(b),
            HttpMethod::Post(None) => self.client.post(endpoint).header("Content-Length", "0"),
        };
        debug!("{:?} {} {:?}", method, path, query);
        let res = request.query(query).send().await?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(api_error(status.as_u16(), &text).into());
        }
        Ok(res)
    }

    async fn make_request_json<T>(
        &self,
        path: &str,
        method: &HttpMethod<'_>,
        query: &[(&str, &str)],
    ) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let res = self.make_request(path, method, query).await?;
        let obj = if self.debug {
            let text = res.text().await?;
            std::fs::create_dir_all("debug")?;
            std::fs::write("debug/youtube_last_res.json", &text)?;
            serde_json::from_str(&text)?
        } else {
            res.json().await?
        };
        Ok(obj)
    }
}

#[async_trait]
impl VideoApi for YoutubeApi {
    async fn list_playlists(
        &self,
        page_token: Option<&str>,
        max_results: u32,
    ) -> Result<Page<Playlist>> {
        let max_results = max_results.to_string();
        let mut query = vec![
            ("part", "snippet,contentDetails"),
            ("mine", "true"),
            ("maxResults", max_results.as_str()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }
        let res: YoutubeListResponse<YoutubePlaylistResponse> = self
            .make_request_json("/playlists", &HttpMethod::Get, &query)
            .await?;
        res.try_into()
    }

    async fn playlist_item_count(&self, playlist_id: &str) -> Result<u64> {
        let query = [("part", "id"), ("playlistId", playlist_id), ("maxResults", "0")];
        let res: YoutubeListResponse<YoutubePlaylistItemResponse> = self
            .make_request_json("/playlistItems", &HttpMethod::Get, &query)
            .await?;
        Ok(res.page_info.map_or(0, |p| p.total_results))
    }

    async fn list_playlist_items(
        &self,
        playlist_id: &str,
        page_token: Option<&str>,
        max_results: u32,
    ) -> Result<Page<PlaylistItem>> {
        let max_results = max_results.to_string();
        let mut query = vec![
            ("part", "snippet"),
            ("playlistId", playlist_id),
            ("maxResults", max_results.as_str()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }
        let res: YoutubeListResponse<YoutubePlaylistItemResponse> = self
            .make_request_json("/playlistItems", &HttpMethod::Get, &query)
            .await?;
        res.try_into()
    }

    async fn insert_playlist(
        &self,
        title: &str,
        description: &str,
        privacy: Privacy,
    ) -> Result<String> {
        let body = json!({
            "snippet": {
                "title": title,
                "description": description,
            },
            "status": {
                "privacyStatus": privacy.as_str(),
            },
        });
        let res: YoutubeInsertResponse = self
            .make_request_json(
                "/playlists",
                &HttpMethod::Post(Some(&body)),
                &[("part", "snippet,status")],
            )
            .await?;
        Ok(res.id)
    }

    async fn insert_playlist_item(&self, playlist_id: &str, video_id: &str) -> Result<()> {
        let body = json!({
            "snippet": {
                "playlistId": playlist_id,
                "resourceId": {
                    "kind": "youtube#video",
                    "videoId": video_id,
                },
            },
        });
        let _: YoutubeInsertResponse = self
            .make_request_json(
                "/playlistItems",
                &HttpMethod::Post(Some(&body)),
                &[("part", "snippet")],
            )
            .await?;
        Ok(())
    }

    async fn like_video(&self, video_id: &str) -> Result<()> {
        // answers 204 without a body
        self.make_request(
            "/videos/rate",
            &HttpMethod::Post(None),
            &[("id", video_id), ("rating", "like")],
        )
        .await?;
        Ok(())
    }
}
