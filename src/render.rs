// Pin-shaped SVG marker icons, one per style color.

pub const ICON_SIZE: [u32; 2] = [30, 50];
pub const ICON_ANCHOR: [i32; 2] = [15, 50];
pub const POPUP_ANCHOR: [i32; 2] = [0, -40];

pub const DEFAULT_MARKER_COLOR: &str = "gray";

const PIN_PATH: &str = "M15 0C6.716 0 0 6.716 0 15c0 8.284 15 35 15 35s15-26.716 15-35c0-8.284-6.716-15-15-15zm0 22.5c-4.136 0-7.5-3.364-7.5-7.5S10.864 7.5 15 7.5 22.5 10.864 22.5 15 19.136 22.5 15 22.5z";

/// Only plain CSS color names are used in icon URLs and SVG attributes.
fn marker_color(color: &str) -> &str {
    let valid = !color.is_empty()
        && color.len() <= 32
        && color.chars().all(|c| c.is_ascii_alphanumeric());
    if valid {
        color
    } else {
        DEFAULT_MARKER_COLOR
    }
}

pub fn marker_svg(color: &str) -> String {
    format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" fill="{color}"><path d="{path}"/></svg>"#,
        w = ICON_SIZE[0],
        h = ICON_SIZE[1],
        color = marker_color(color),
        path = PIN_PATH,
    )
}

pub fn icon_url(color: &str) -> String {
    format!("/icons/{}.svg", marker_color(color))
}

/// Color named by an icon file such as `darkred.svg`.
pub fn color_from_icon_file(file: &str) -> Option<&str> {
    file.strip_suffix(".svg").map(marker_color)
}
