use crate::{
    error::Result,
    spotify::client::ApiClient,
    types::{
        Paging, Playlist, PlaylistItem, SavedAlbum, SavedTrack, SearchKind, SearchResults,
        SimplifiedPlaylist, UserProfile,
    },
};

/// Read-only catalog queries for the music widget.
#[derive(Clone)]
pub struct CatalogClient {
    api: ApiClient,
}

impl CatalogClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// `GET /me`
    pub async fn current_user(&self) -> Result<UserProfile> {
        self.api.get_json("/me", &[]).await
    }

    /// Playlists owned or followed by the current user.
    ///
    /// `GET /me/playlists`
    pub async fn playlists(&self, limit: u32, offset: u32) -> Result<Paging<SimplifiedPlaylist>> {
        self.api
            .get_json("/me/playlists", &page_query(limit, offset))
            .await
    }

    /// `GET /playlists/{id}`
    pub async fn playlist(&self, playlist_id: &str) -> Result<Playlist> {
        self.api
            .get_json(&format!("/playlists/{playlist_id}"), &[])
            .await
    }

    /// One page of a playlist's items. Items whose track is no longer
    /// available come back with `track: None`.
    ///
    /// `GET /playlists/{id}/tracks`
    pub async fn playlist_tracks(
        &self,
        playlist_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Paging<PlaylistItem>> {
        self.api
            .get_json(
                &format!("/playlists/{playlist_id}/tracks"),
                &page_query(limit, offset),
            )
            .await
    }

    /// Searches the catalog. An empty `kinds` searches tracks only.
    ///
    /// `GET /search`
    ///
    /// # Arguments
    ///
    /// * `query` - Free-text query, sent as `q`
    /// * `kinds` - Result types to include, joined into `type`
    /// * `limit` - Results per type, clamped to `1..=50`
    ///
    /// # Errors
    ///
    /// Any [`crate::Error`] from the underlying request.
    ///
    /// # Example
    ///
    /// ```
    /// let results = catalog
    ///     .search("daft punk", &[SearchKind::Track, SearchKind::Album], 10)
    ///     .await?;
    /// for track in results.tracks.map(|p| p.items).unwrap_or_default() {
    ///     println!("{}", track.name);
    /// }
    /// ```
    pub async fn search(
        &self,
        query: &str,
        kinds: &[SearchKind],
        limit: u32,
    ) -> Result<SearchResults> {
        let kinds = if kinds.is_empty() {
            SearchKind::Track.as_str().to_string()
        } else {
            kinds
                .iter()
                .map(SearchKind::as_str)
                .collect::<Vec<_>>()
                .join(",")
        };

        self.api
            .get_json(
                "/search",
                &[
                    ("q", query.to_string()),
                    ("type", kinds),
                    ("limit", clamp_limit(limit).to_string()),
                ],
            )
            .await
    }

    /// `GET /me/tracks`
    pub async fn saved_tracks(&self, limit: u32, offset: u32) -> Result<Paging<SavedTrack>> {
        self.api
            .get_json("/me/tracks", &page_query(limit, offset))
            .await
    }

    /// `GET /me/albums`
    pub async fn saved_albums(&self, limit: u32, offset: u32) -> Result<Paging<SavedAlbum>> {
        self.api
            .get_json("/me/albums", &page_query(limit, offset))
            .await
    }
}

// the Web API caps page sizes at 50
fn clamp_limit(limit: u32) -> u32 {
    limit.clamp(1, 50)
}

fn page_query(limit: u32, offset: u32) -> Vec<(&'static str, String)> {
    vec![
        ("limit", clamp_limit(limit).to_string()),
        ("offset", offset.to_string()),
    ]
}
