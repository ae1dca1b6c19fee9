//! InfluxDB line protocol encoding.
//!
//! `measurement[,tag=value...] field=value[,field=value...]`, one line per
//! point, no timestamp.

use crate::model::{FieldValue, Point};
use std::fmt::Write;

pub fn encode(points: &[Point]) -> String {
    let mut out = String::new();
    for (i, point) in points.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        encode_point(&mut out, point);
    }
    out
}

fn encode_point(out: &mut String, point: &Point) {
    escape_into(out, &point.measurement, &[',', ' ']);

    // The store rejects empty tag values
    for (key, value) in point.tags.iter().filter(|(_, v)| !v.is_empty()) {
        out.push(',');
        escape_into(out, key, &[',', '=', ' ']);
        out.push('=');
        escape_into(out, value, &[',', '=', ' ']);
    }

    out.push(' ');
    for (i, (key, value)) in point.fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        escape_into(out, key, &[',', '=', ' ']);
        out.push('=');
        match value {
            FieldValue::Integer(v) => {
                let _ = write!(out, "{}i", v);
            }
            FieldValue::Float(v) => {
                let _ = write!(out, "{}", v);
            }
        }
    }
}

fn escape_into(out: &mut String, s: &str, special: &[char]) {
    for c in s.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
}
