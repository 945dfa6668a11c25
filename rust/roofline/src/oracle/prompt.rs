// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Prompt construction for detection and verification requests.

use std::fmt::Write;

use crate::projection::PercentPoint;
use crate::types::LineRole;

/// A line as shown to the verifier: role, index within role, and its
/// endpoints in image percentages.
#[derive(Debug, Clone, Copy)]
pub struct PromptLine {
    pub role: LineRole,
    pub index: usize,
    pub start: PercentPoint,
    pub end: PercentPoint,
}

const RESPONSE_SCHEMA: &str = r#"{
  "ridges":  [{ "start": {"x": 0-100, "y": 0-100}, "end": {"x": 0-100, "y": 0-100}, "confidence": 0-100, "description": "visual evidence" }],
  "hips":    [ same shape ],
  "valleys": [ same shape ]
}"#;

const VERIFICATION_SCHEMA: &str = r#"{
  "lines": [{ "role": "ridge|hip|valley", "index": 0, "score": 0-100, "direction": "up|down|left|right", "distanceFt": 0.0 }]
}"#;

/// Builds the feature-detection prompt.
///
/// `floating` carries endpoints that failed the connectivity check on a
/// previous pass; when present the prompt asks the oracle to reconnect them.
pub fn detection_prompt(
    perimeter: &[PercentPoint],
    roof_type: Option<&str>,
    floating: Option<&[PercentPoint]>,
) -> String {
    let mut prompt = String::with_capacity(2048);

    prompt.push_str(
        "You are analysing a top-down satellite image of a single building roof. \
         Coordinates are percentages of the image: x from 0 (left) to 100 (right), \
         y from 0 (top) to 100 (bottom).\n\n",
    );

    prompt.push_str("The building perimeter corners, in order, are:\n");
    for (i, p) in perimeter.iter().enumerate() {
        let _ = writeln!(prompt, "  corner {}: ({:.2}, {:.2})", i, p.x, p.y);
    }

    if let Some(kind) = roof_type {
        let _ = writeln!(prompt, "\nThe roof is believed to be of type: {kind}.");
    }

    prompt.push_str(
        "\nIdentify the structural roof lines:\n\
         - ridges: the topmost horizontal lines where two roof planes meet at a peak\n\
         - hips: diagonal lines running from a ridge end down to an exterior corner\n\
         - valleys: interior lines where two roof planes form a downward trough\n\n\
         Every hip and valley endpoint must land on a perimeter corner or on the endpoint \
         of another line. Do not leave endpoints floating in the middle of a roof plane.\n",
    );

    if let Some(points) = floating.filter(|p| !p.is_empty()) {
        prompt.push_str(
            "\nA previous answer left these endpoints unconnected. Re-examine the image and \
             make sure every endpoint connects to a corner or another line:\n",
        );
        for p in points {
            let _ = writeln!(prompt, "  ({:.2}, {:.2})", p.x, p.y);
        }
    }

    prompt.push_str("\nRespond with a single JSON object of this shape and nothing else:\n");
    prompt.push_str(RESPONSE_SCHEMA);
    prompt.push('\n');
    prompt
}

/// Builds the alignment-verification prompt.
///
/// `rendered` tells the oracle whether the lines are drawn on the image it
/// receives (ridges red, hips blue, valleys green) or only listed here.
pub fn verification_prompt(lines: &[PromptLine], rendered: bool) -> String {
    let mut prompt = String::with_capacity(1024 + lines.len() * 64);

    if rendered {
        prompt.push_str(
            "The satellite image shows a roof with a line overlay: ridges in red, hips in blue, \
             valleys in green, the building perimeter in yellow.\n",
        );
    } else {
        prompt.push_str(
            "The satellite image shows a roof. The proposed roof lines are listed below in \
             image percentages (x right, y down).\n",
        );
    }

    prompt.push_str("\nLines:\n");
    for line in lines {
        let _ = writeln!(
            prompt,
            "  {} {}: ({:.2}, {:.2}) -> ({:.2}, {:.2})",
            line.role.as_str(),
            line.index,
            line.start.x,
            line.start.y,
            line.end.x,
            line.end.y
        );
    }

    prompt.push_str(
        "\nFor each line, score how well it sits on the visible roof edge from 0 to 100. \
         If a line is misaligned, suggest a single shift direction (up, down, left or right) \
         and a distance in feet that would align it.\n\
         Respond with a single JSON object of this shape and nothing else:\n",
    );
    prompt.push_str(VERIFICATION_SCHEMA);
    prompt.push('\n');
    prompt
}
