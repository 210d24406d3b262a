use serde::Deserialize;

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct YoutubeListResponse<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    pub next_page_token: Option<String>,
    pub page_info: Option<YoutubePageInfo>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct YoutubePageInfo {
    pub total_results: u64,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct YoutubePlaylistResponse {
    pub id: String,
    pub snippet: YoutubePlaylistSnippet,
    pub content_details: Option<YoutubePlaylistContentDetails>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct YoutubePlaylistSnippet {
    pub title: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct YoutubePlaylistContentDetails {
    pub item_count: u64,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct YoutubePlaylistItemResponse {
    pub id: String,
    pub snippet: Option<YoutubePlaylistItemSnippet>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct YoutubePlaylistItemSnippet {
    pub title: String,
    pub resource_id: YoutubeResourceId,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct YoutubeResourceId {
    #[allow(dead_code)]
    pub kind: String,
    pub video_id: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct YoutubeInsertResponse {
    pub id: String,
}

#[derive(Deserialize, Debug)]
pub struct YoutubeErrorResponse {
    pub error: YoutubeErrorBody,
}

#[derive(Deserialize, Debug)]
pub struct YoutubeErrorBody {
    #[allow(dead_code)]
    pub code: u16,
    pub message: String,
    #[serde(default)]
    pub errors: Vec<YoutubeErrorDetail>,
}

#[derive(Deserialize, Debug)]
pub struct YoutubeErrorDetail {
    pub reason: String,
}
