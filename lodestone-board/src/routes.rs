use crate::board::DisplayState;
use crate::copy::{Clipboard, copy_address};
use crate::error::AppError;
use crate::render::{AvatarCard, BoardImage, render_board};
use crate::validation;
use crate::AppState;

use axum::{
    extract::{Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
    Json,
};
use lodestone_api::StatusSource;
use serde::Serialize;
use std::sync::Arc;
use tokio::time::Instant;

#[derive(Serialize)]
pub(crate) struct PlayerCard {
    name: String,
    /// Board-relative avatar path, absent for names the avatar service can't take
    #[serde(skip_serializing_if = "Option::is_none")]
    avatar: Option<String>,
}

#[derive(Serialize)]
pub(crate) struct StatusView {
    state: DisplayState,
    online_count: u32,
    players: Vec<PlayerCard>,
    copied: bool,
    address: String,
}

#[derive(Serialize)]
pub(crate) struct CopyResponse {
    copied: bool,
}

pub(crate) async fn status<S: StatusSource, C: Clipboard>(
    State(state): State<Arc<AppState<S, C>>>,
) -> Json<StatusView> {
    let board = state.board.state();

    let players = board
        .snapshot
        .players
        .iter()
        .map(|name| PlayerCard {
            name: name.clone(),
            avatar: validation::validate_player_name(name)
                .ok()
                .map(|_| format!("/avatar/{name}")),
        })
        .collect();

    Json(StatusView {
        state: board.display_state(),
        online_count: board.snapshot.online_count,
        players,
        copied: board.is_copied(Instant::now()),
        address: state.address.clone(),
    })
}

pub(crate) async fn status_png<S: StatusSource, C: Clipboard>(
    State(state): State<Arc<AppState<S, C>>>,
) -> Result<impl IntoResponse, AppError> {
    let board = state.board.state();

    let png = match board.display_state() {
        DisplayState::Loading => render_board(&BoardImage::Loading, &state.render)?,
        DisplayState::Error => render_board(&BoardImage::Unreachable, &state.render)?,
        DisplayState::Empty => render_board(&BoardImage::Empty, &state.render)?,
        DisplayState::Populated => {
            let heads = state.avatars.get_all(&board.snapshot.players).await;
            let cards: Vec<AvatarCard> = board
                .snapshot
                .players
                .iter()
                .zip(heads)
                .map(|(name, head)| AvatarCard {
                    name: name.clone(),
                    head_data: Some(head.to_vec()),
                })
                .collect();
            render_board(
                &BoardImage::Roster {
                    online_count: board.snapshot.online_count,
                    cards: &cards,
                },
                &state.render,
            )?
        }
    };

    Ok((
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        png,
    ))
}

pub(crate) async fn avatar<S: StatusSource, C: Clipboard>(
    State(state): State<Arc<AppState<S, C>>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    validation::validate_player_name(&name)?;

    let head = state.avatars.get(&name).await;

    Ok((
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CACHE_CONTROL, "public, max-age=3600"),
        ],
        head,
    ))
}

pub(crate) async fn retry<S: StatusSource, C: Clipboard>(
    State(state): State<Arc<AppState<S, C>>>,
) -> impl IntoResponse {
    state.board.retry_now();
    StatusCode::ACCEPTED
}

pub(crate) async fn copy<S: StatusSource, C: Clipboard>(
    State(state): State<Arc<AppState<S, C>>>,
) -> impl IntoResponse {
    let copied = copy_address(&state.board, &state.clipboard, &state.address).await;
    Json(CopyResponse { copied })
}
