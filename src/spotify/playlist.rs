use std::{collections::HashSet, future::Future};

use rand::seq::SliceRandom;
use reqwest::Client;
use tokio::task::JoinSet;

use crate::{
    config::Settings,
    error::ProviderError,
    provider::PlaylistGenerator,
    spotify::read_json,
    types::{
        AddTrackToPlaylistRequest, AddTrackToPlaylistResponse, Artist, ArtistTopTracksResponse, CreatePlaylistRequest,
        CurrentUser, Playlist, TopArtistsResponse, TopTracksResponse, Token, Track,
    },
    utils, warning,
};

/// Spotify accepts at most this many URIs per "add items" call.
const TRACKS_PER_REQUEST: usize = 100;
const TOP_TRACKS_LIMIT: usize = 50;
const TOP_ARTISTS_LIMIT: usize = 20;
const PLAYLIST_DESCRIPTION: &str = "Fresh picks from the artists you listen to most.";

/// Builds discovery playlists from the user's listening history.
///
/// Candidates are the top tracks of the user's most played artists, minus
/// the tracks the user already plays the most. When that leaves nothing,
/// the user's own top tracks are used instead.
#[derive(Debug, Clone)]
pub struct SpotifyGenerator {
    client: Client,
    api_url: String,
}

impl SpotifyGenerator {
    pub fn new(client: Client, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into(),
        }
    }

    pub fn from_settings(client: Client, settings: &Settings) -> Self {
        Self::new(client, settings.spotify.api_url.clone())
    }

    async fn top_tracks(&self, token: &Token) -> Result<Vec<Track>, ProviderError> {
        let api_url = format!(
            "{uri}/me/top/tracks?limit={limit}&time_range=medium_term",
            uri = self.api_url,
            limit = TOP_TRACKS_LIMIT
        );
        let res = self
            .client
            .get(&api_url)
            .bearer_auth(&token.access_token)
            .send()
            .await?;
        let json: TopTracksResponse = read_json(res).await?;
        Ok(json.items)
    }

    async fn top_artists(&self, token: &Token) -> Result<Vec<Artist>, ProviderError> {
        let api_url = format!(
            "{uri}/me/top/artists?limit={limit}&time_range=medium_term",
            uri = self.api_url,
            limit = TOP_ARTISTS_LIMIT
        );
        let res = self
            .client
            .get(&api_url)
            .bearer_auth(&token.access_token)
            .send()
            .await?;
        let json: TopArtistsResponse = read_json(res).await?;
        Ok(json.items)
    }

    /// Top tracks of every artist, fetched concurrently. Artists whose
    /// request fails are skipped.
    async fn artists_top_tracks(&self, token: &Token, artists: &[Artist]) -> Vec<Track> {
        let lookups: Vec<_> = artists
            .iter()
            .map(|artist| {
                let client = self.client.clone();
                let access_token = token.access_token.clone();
                let api_url = format!(
                    "{uri}/artists/{id}/top-tracks?market=from_token",
                    uri = self.api_url,
                    id = artist.id
                );
                let lookup = async move {
                    let res = client.get(&api_url).bearer_auth(access_token).send().await?;
                    let json: ArtistTopTracksResponse = read_json(res).await?;
                    Ok::<_, ProviderError>(json.tracks)
                };
                (artist.name.clone(), lookup)
            })
            .collect();

        gather_tracks(lookups).await
    }

    async fn current_user(&self, token: &Token) -> Result<CurrentUser, ProviderError> {
        let res = self
            .client
            .get(format!("{}/me", self.api_url))
            .bearer_auth(&token.access_token)
            .send()
            .await?;
        read_json(res).await
    }
}

/// Runs every lookup as a task on one `JoinSet` and collects the tracks.
///
/// Failed lookups are logged under their artist name and skipped. Dropping
/// the returned future aborts the lookups still in flight.
async fn gather_tracks<F>(lookups: Vec<(String, F)>) -> Vec<Track>
where
    F: Future<Output = Result<Vec<Track>, ProviderError>> + Send + 'static,
{
    let mut tasks = JoinSet::new();
    for (name, lookup) in lookups {
        tasks.spawn(async move { (name, lookup.await) });
    }

    let mut tracks = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Ok(artist_tracks))) => tracks.extend(artist_tracks),
            Ok((name, Err(e))) => warning!("Skipping top tracks of {}: {}", name, e),
            Err(e) => warning!("Task join error: {}", e),
        }
    }
    tracks
}

/// Drops tracks the user already knows, de-duplicates, shuffles and cuts
/// the pool to `max_items`.
pub fn select_tracks(mut pool: Vec<Track>, known: &[Track], max_items: usize) -> Vec<Track> {
    let known: HashSet<&str> = known.iter().map(|t| t.uri.as_str()).collect();
    pool.retain(|t| !known.contains(t.uri.as_str()));
    utils::remove_duplicate_tracks(&mut pool);
    pool.shuffle(&mut rand::rng());
    pool.truncate(max_items);
    pool
}

impl PlaylistGenerator for SpotifyGenerator {
    async fn generate(&self, token: &Token, max_items: usize) -> Result<Vec<Track>, ProviderError> {
        let known = self.top_tracks(token).await?;
        let artists = self.top_artists(token).await?;
        let pool = self.artists_top_tracks(token, &artists).await;

        let mut tracks = select_tracks(pool, &known, max_items);
        if tracks.is_empty() {
            tracks = select_tracks(known, &[], max_items);
        }
        if tracks.is_empty() {
            return Err(ProviderError::Unexpected(
                "no listening history to build a playlist from".into(),
            ));
        }
        Ok(tracks)
    }

    async fn create_playlist(
        &self,
        token: &Token,
        name: &str,
        tracks: &[Track],
    ) -> Result<Playlist, ProviderError> {
        let user = self.current_user(token).await?;

        let res = self
            .client
            .post(format!("{}/users/{}/playlists", self.api_url, user.id))
            .bearer_auth(&token.access_token)
            .json(&CreatePlaylistRequest {
                name: name.to_string(),
                description: PLAYLIST_DESCRIPTION.to_string(),
                public: false,
                collaborative: false,
            })
            .send()
            .await?;
        let playlist: Playlist = read_json(res).await?;

        for chunk in tracks.chunks(TRACKS_PER_REQUEST) {
            let res = self
                .client
                .post(format!("{}/playlists/{}/tracks", self.api_url, playlist.id))
                .bearer_auth(&token.access_token)
                .json(&AddTrackToPlaylistRequest {
                    uris: chunk.iter().map(|t| t.uri.clone()).collect(),
                })
                .send()
                .await?;
            let _: AddTrackToPlaylistResponse = read_json(res).await?;
        }

        Ok(playlist)
    }
}
