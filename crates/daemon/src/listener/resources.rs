// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Volume and network request handlers.

use super::{error_response, ListenCtx};
use jl_core::{Clock, NetworkConfig, NetworkType, SystemClock, Volume, VolumeType};
use jl_engine::EngineError;
use jl_wire::{ErrorCode, Response, VolumeSummary};

pub(crate) fn handle_create_volume(
    ctx: &ListenCtx,
    name: &str,
    volume_type: &str,
    size_bytes: u64,
) -> Response {
    let volume_type = match volume_type {
        "filesystem" => VolumeType::Filesystem,
        "memory" => VolumeType::Memory,
        other => {
            return Response::error(
                ErrorCode::InvalidArgument,
                format!("unknown volume type {other:?} (expected filesystem or memory)"),
            );
        }
    };
    if name.is_empty() {
        return Response::error(ErrorCode::InvalidArgument, "volume name must not be empty");
    }

    let mut volume = Volume::new(name, volume_type, size_bytes, SystemClock.epoch_ms());
    if volume_type == VolumeType::Filesystem {
        let path = ctx.volumes_root.join(name);
        if let Err(e) = std::fs::create_dir_all(&path) {
            return error_response(&EngineError::Internal(format!(
                "failed to create volume directory: {e}"
            )));
        }
        volume.path = Some(path);
    }

    match ctx.volumes.create(volume) {
        Ok(()) => Response::Ok,
        Err(e) => error_response(&EngineError::store("create volume", e)),
    }
}

pub(crate) fn handle_list_volumes(ctx: &ListenCtx) -> Response {
    match ctx.volumes.list() {
        Ok(volumes) => {
            let mut volumes: Vec<VolumeSummary> = volumes
                .iter()
                .map(|v| VolumeSummary {
                    name: v.name.clone(),
                    volume_type: v.volume_type.to_string(),
                    size_bytes: v.size_bytes,
                    job_count: v.job_count,
                })
                .collect();
            volumes.sort_by(|a, b| a.name.cmp(&b.name));
            Response::Volumes { volumes }
        }
        Err(e) => error_response(&EngineError::store("list volumes", e)),
    }
}

pub(crate) fn handle_remove_volume(ctx: &ListenCtx, name: &str) -> Response {
    match ctx.volumes.remove(name) {
        Ok(volume) => {
            if let Some(path) = volume.path {
                if let Err(e) = std::fs::remove_dir_all(&path) {
                    tracing::warn!(volume = name, error = %e, "volume directory removal failed");
                }
            }
            Response::Ok
        }
        Err(e) => error_response(&EngineError::store("remove volume", e)),
    }
}

pub(crate) fn handle_create_network(ctx: &ListenCtx, name: &str, cidr: &str) -> Response {
    if name.is_empty() {
        return Response::error(ErrorCode::InvalidArgument, "network name must not be empty");
    }
    let config = NetworkConfig::new(name, NetworkType::Custom)
        .cidr(cidr)
        .bridge_name(format!("jl-{name}"));
    match ctx.networks.create(config) {
        Ok(()) => Response::Ok,
        Err(e) => error_response(&EngineError::store("create network", e)),
    }
}

pub(crate) fn handle_list_networks(ctx: &ListenCtx) -> Response {
    match ctx.networks.list() {
        Ok(mut networks) => {
            networks.sort_by(|a, b| a.name.cmp(&b.name));
            Response::Networks { networks }
        }
        Err(e) => error_response(&EngineError::store("list networks", e)),
    }
}

pub(crate) fn handle_remove_network(ctx: &ListenCtx, name: &str) -> Response {
    match ctx.networks.remove(name) {
        Ok(_) => Response::Ok,
        Err(e) => error_response(&EngineError::store("remove network", e)),
    }
}
