//! HTTP handlers for the REST API.
//!
//! Each handler corresponds to an API endpoint and delegates to the
//! service layer. Inputs are small, so CPU work runs inline.

use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    Json,
};

use super::dto::{
    AllocationMode, AllocationRequest, AllocationResponse, ExportRequest, HealthResponse,
    SessionRequest, SettleRequest, SettleResponse, ValidationRequest,
};
use super::error::AppError;
use super::state::AppState;
use crate::models::{trigger_events, TriggerKind};
use crate::parsing::{parse_debug_log, parse_nina_log};
use crate::services::aggregation::aggregate_frames;
use crate::services::allocation::{balance_plan, plan_targets, AllocationParams};
use crate::services::export::{export_acquisitions, parse_filter_map, DEFAULT_FILTER_MAP};
use crate::services::goals::resolve_weights;
use crate::services::session::{analyze_session, SessionAnalysis, SessionOptions};
use crate::services::settle::{correlate_dithers, settle_statistics};
use crate::services::validation::{score_frames, ValidationSummary};
use crate::settings::PlannerSettings;

/// Result type for handlers.
pub type HandlerResult<T> = Result<Json<T>, AppError>;

// =============================================================================
// Health Check
// =============================================================================

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> HandlerResult<HealthResponse> {
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: "v1".to_string(),
        settings_backend: state.settings.backend_name().to_string(),
    }))
}

// =============================================================================
// Planning
// =============================================================================

/// POST /v1/allocation
///
/// Allocation table for every target in the submitted frames.
pub async fn allocation(
    State(state): State<AppState>,
    Json(request): Json<AllocationRequest>,
) -> HandlerResult<AllocationResponse> {
    let params = AllocationParams {
        desired_hours: request.desired_hours,
        band: request.band,
        subframe_minutes: request
            .subframe_minutes
            .unwrap_or(state.config.planner.subframe_minutes),
    };

    let totals = aggregate_frames(&request.frames, request.exclude_rejected)?;
    let weights = resolve_weights(request.weights.as_ref(), !totals.is_empty())?;

    let rows = match request.mode {
        AllocationMode::Total => plan_targets(
            &request.frames,
            Some(&weights),
            &params,
            &request.target_hours,
            request.exclude_rejected,
        )?,
        AllocationMode::Balance => {
            let mut rows = Vec::new();
            for (target, filters) in &totals {
                rows.extend(balance_plan(target, filters, &weights, &params)?);
            }
            rows
        }
    };

    Ok(Json(AllocationResponse {
        mode: request.mode,
        weights,
        rows,
    }))
}

/// POST /v1/export/acquisitions
///
/// AstroBin acquisition CSV for the submitted frames.
pub async fn export_csv(Json(request): Json<ExportRequest>) -> Result<impl IntoResponse, AppError> {
    let filter_map = parse_filter_map(request.filter_map.as_deref().unwrap_or(DEFAULT_FILTER_MAP));
    let csv = export_acquisitions(&request.frames, &filter_map)?;
    Ok(([(header::CONTENT_TYPE, "text/csv; charset=utf-8")], csv))
}

// =============================================================================
// Session Diagnostics
// =============================================================================

/// POST /v1/session/analyze
///
/// Timeline segmentation of a NINA log, plus guiding bursts when a PHD2
/// guide log is supplied.
pub async fn analyze(
    State(state): State<AppState>,
    Json(request): Json<SessionRequest>,
) -> HandlerResult<SessionAnalysis> {
    let defaults = state.config.session_options();
    let options = SessionOptions {
        segmenter: request.segmenter.unwrap_or(defaults.segmenter),
        bursts: request.bursts.unwrap_or(defaults.bursts),
    };
    let analysis = analyze_session(&request.nina_log, request.guide_log.as_deref(), &options)?;
    Ok(Json(analysis))
}

/// POST /v1/settle
///
/// Settle statistics from a PHD2 debug log, with each dither matched to the
/// closest settle event.
pub async fn settle(
    State(state): State<AppState>,
    Json(request): Json<SettleRequest>,
) -> HandlerResult<SettleResponse> {
    let max_delta = request
        .max_delta_secs
        .unwrap_or(state.config.settle.dither_match_secs);
    if !(max_delta.is_finite() && max_delta >= 0.0) {
        return Err(AppError::BadRequest(format!(
            "maxDeltaSecs must be a non-negative number, got {}",
            max_delta
        )));
    }

    let log = parse_debug_log(&request.debug_log, request.file_name.as_deref());
    let dither_times: Vec<_> = match &request.nina_log {
        Some(text) => trigger_events(&parse_nina_log(text).events)
            .into_iter()
            .filter(|t| t.kind == TriggerKind::Dither)
            .map(|t| t.timestamp)
            .collect(),
        None => log.dithers.iter().map(|d| d.timestamp).collect(),
    };

    Ok(Json(SettleResponse {
        statistics: settle_statistics(&log.settles),
        correlations: correlate_dithers(&dither_times, &log.settles, max_delta),
        dither_commands: log.dithers,
        lines_skipped: log.lines_skipped,
    }))
}

/// POST /v1/validation
///
/// Confusion summary of rejection flags against quality scores.
pub async fn validation(Json(request): Json<ValidationRequest>) -> HandlerResult<ValidationSummary> {
    Ok(Json(score_frames(&request.frames, &request.threshold)?))
}

// =============================================================================
// Settings
// =============================================================================

/// GET /v1/settings
pub async fn get_settings(State(state): State<AppState>) -> HandlerResult<PlannerSettings> {
    Ok(Json(PlannerSettings::load(state.settings.as_ref()).await?))
}

/// PUT /v1/settings
///
/// Replace the stored settings; missing fields take their defaults.
pub async fn put_settings(
    State(state): State<AppState>,
    Json(settings): Json<PlannerSettings>,
) -> HandlerResult<PlannerSettings> {
    settings.save(state.settings.as_ref()).await?;
    Ok(Json(PlannerSettings::load(state.settings.as_ref()).await?))
}
