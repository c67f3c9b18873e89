// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use mediashelf::attributes::Attributes;
use mediashelf::template::render;

#[derive(Arbitrary, Debug)]
struct Input {
    template: String,
    values: Vec<(String, String)>,
    exclude_unknown: bool,
}

fuzz_target!(|input: Input| {
    let mut attributes: Attributes = input
        .values
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    attributes.set("filename_with_extension", "file.bin");

    let rendered = render(&input.template, &attributes, input.exclude_unknown);
    assert!(!rendered.contains('{') && !rendered.contains('}'));
    assert!(!rendered.is_empty());
    assert!(!rendered.split('/').any(|s| s.is_empty() || s == ".."));
});
