use std::path::Path;

use roxmltree::{Document, Node};

use super::control_graph::{ControlGraph, ControlSetting, Device};
use crate::models::config::DirectionConfig;
use crate::models::device::Direction;
use crate::models::error::ConfigError;
use crate::models::format::SampleFormat;

const ROOT_ELEMENT: &str = "tinyalsa-audio";

/// Read and parse a routing configuration file.
///
/// An unreadable or malformed file is fatal. Unknown attributes and
/// enumerators inside a well-formed file are logged and skipped.
pub fn load_file(path: impl AsRef<Path>) -> Result<ControlGraph, ConfigError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    log::debug!("Loading routing config from {}", path.display());
    load_str(&text)
}

/// Parse a routing configuration held in memory.
pub fn load_str(text: &str) -> Result<ControlGraph, ConfigError> {
    let doc = Document::parse(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
    let root = doc.root_element();

    if root.tag_name().name() == ROOT_ELEMENT {
        if let Some(board) = root.attribute("device") {
            log::debug!("Parsing config for device: {}", board);
        }
    } else {
        log::warn!("Unexpected root element: {}", root.tag_name().name());
    }

    let mut graph = ControlGraph::default();
    walk(root, None, &mut graph);

    log::info!(
        "Routing config loaded: {} output, {} input, {} modem devices",
        graph.output.devices.len(),
        graph.input.devices.len(),
        graph.modem.devices.len()
    );
    Ok(graph)
}

fn walk(node: Node<'_, '_>, direction: Option<Direction>, graph: &mut ControlGraph) {
    for child in node.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "output" => parse_direction(child, Direction::Output, graph),
            "input" => parse_direction(child, Direction::Input, graph),
            "modem" => parse_direction(child, Direction::Modem, graph),
            "device" => {
                // Devices outside a direction element belong to output.
                let direction = direction.unwrap_or(Direction::Output);
                if let Some(device) = parse_device(child, direction) {
                    graph.direction_mut(direction).devices.push(device);
                }
            }
            other => {
                log::warn!("Unknown config element: {}", other);
                walk(child, direction, graph);
            }
        }
    }
}

fn parse_direction(node: Node<'_, '_>, direction: Direction, graph: &mut ControlGraph) {
    let mut config = DirectionConfig::default();

    for attr in node.attributes() {
        let (name, value) = (attr.name(), attr.value());
        match (direction, name) {
            (_, "card") => config.card = parse_number(name, value),
            (_, "device") => config.device = parse_number(name, value),
            (Direction::Modem, _) => log::warn!("Unknown modem attr: {}", name),
            (_, "rate") => config.sample_rate = parse_number(name, value),
            (_, "channels") => config.channels = parse_channels(direction, value),
            (_, "format") => match SampleFormat::from_config_name(value) {
                Some(format) => config.format = Some(format),
                None => log::warn!("Unknown format attr: {}", value),
            },
            (_, "period_size") => config.period_size = parse_number(name, value),
            (_, "period_count") => config.period_count = parse_number(name, value),
            _ => log::warn!("Unknown {} attr: {}", direction, name),
        }
    }

    graph.direction_mut(direction).config = config;
    walk(node, Some(direction), graph);
}

fn parse_channels(direction: Direction, value: &str) -> u16 {
    let allowed: &[u16] = match direction {
        Direction::Input => &[1, 2],
        Direction::Output | Direction::Modem => &[1, 2, 4, 6, 8],
    };
    match value.trim().parse::<u16>() {
        Ok(channels) if allowed.contains(&channels) => channels,
        _ => {
            log::warn!("Unknown channel attr: {}", value);
            0
        }
    }
}

fn parse_number(name: &str, value: &str) -> u32 {
    value.trim().parse().unwrap_or_else(|_| {
        log::warn!("Invalid numeric value for {}: {}", name, value);
        0
    })
}

fn parse_device(node: Node<'_, '_>, direction: Direction) -> Option<Device> {
    for attr in node.attributes().filter(|a| a.name() != "type") {
        log::warn!("Unknown device attr: {}", attr.name());
    }

    let device_type = match node.attribute("type") {
        Some(name) => match direction.parse_device_name(name) {
            Some(device_type) => device_type,
            None => {
                log::warn!("Unknown {} device type: {}", direction, name);
                return None;
            }
        },
        None => {
            log::warn!("Missing type for device element");
            return None;
        }
    };

    let mut device = Device::new(device_type);
    for path in node.children().filter(|n| n.is_element()) {
        if path.tag_name().name() != "path" {
            log::warn!("Unknown element in device {}: {}", device_type, path.tag_name().name());
            continue;
        }
        let list = match path.attribute("type") {
            Some("enable") => &mut device.enable,
            Some("disable") => &mut device.disable,
            other => {
                log::warn!("Unknown path type: {:?}", other);
                continue;
            }
        };
        list.extend(path.children().filter(|n| n.is_element()).filter_map(parse_ctrl));
    }

    Some(device)
}

fn parse_ctrl(node: Node<'_, '_>) -> Option<ControlSetting> {
    if node.tag_name().name() != "ctrl" {
        log::warn!("Unknown element in path: {}", node.tag_name().name());
        return None;
    }

    let mut name = None;
    let mut value = None;
    let mut tag = None;
    for attr in node.attributes() {
        match attr.name() {
            "name" => name = Some(attr.value()),
            "value" => value = Some(attr.value()),
            "attr" => tag = Some(attr.value()),
            other => log::warn!("Unknown ctrl attr: {}", other),
        }
    }

    match (name, value) {
        (Some(name), Some(value)) => Some(ControlSetting {
            name: name.to_string(),
            value: value.to_string(),
            attr: tag.map(str::to_string),
        }),
        _ => {
            log::warn!("Dropping ctrl without name or value: {:?}", name);
            None
        }
    }
}
