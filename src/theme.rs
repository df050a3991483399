use ratatui::style::Color;

#[derive(Debug)]
pub struct Theme {
  pub name: &'static str,
  pub bg: Color,
  pub fg: Color,
  pub accent: Color,
  pub muted: Color,
  pub border: Color,
  pub highlight_fg: Color,
  pub highlight_bg: Color,
  pub stripe_bg: Color,
  pub status: Color,
  pub error: Color,
  pub key_fg: Color,
  pub key_bg: Color,
}

pub static THEMES: [Theme; 3] = [
  Theme {
    name: "Mocha",
    bg: Color::Rgb(30, 30, 46),
    fg: Color::Rgb(205, 214, 244),
    accent: Color::Rgb(243, 139, 168),
    muted: Color::Rgb(127, 132, 156),
    border: Color::Rgb(69, 71, 90),
    highlight_fg: Color::Rgb(30, 30, 46),
    highlight_bg: Color::Rgb(203, 166, 247),
    stripe_bg: Color::Rgb(36, 36, 54),
    status: Color::Rgb(249, 226, 175),
    error: Color::Rgb(243, 139, 168),
    key_fg: Color::Rgb(30, 30, 46),
    key_bg: Color::Rgb(137, 180, 250),
  },
  Theme {
    name: "Latte",
    bg: Color::Rgb(239, 241, 245),
    fg: Color::Rgb(76, 79, 105),
    accent: Color::Rgb(210, 15, 57),
    muted: Color::Rgb(140, 143, 161),
    border: Color::Rgb(188, 192, 204),
    highlight_fg: Color::Rgb(239, 241, 245),
    highlight_bg: Color::Rgb(136, 57, 239),
    stripe_bg: Color::Rgb(230, 233, 239),
    status: Color::Rgb(223, 142, 29),
    error: Color::Rgb(210, 15, 57),
    key_fg: Color::Rgb(239, 241, 245),
    key_bg: Color::Rgb(30, 102, 245),
  },
  Theme {
    name: "Terminal",
    bg: Color::Reset,
    fg: Color::White,
    accent: Color::Red,
    muted: Color::DarkGray,
    border: Color::Gray,
    highlight_fg: Color::Black,
    highlight_bg: Color::Cyan,
    stripe_bg: Color::Reset,
    status: Color::Yellow,
    error: Color::LightRed,
    key_fg: Color::Black,
    key_bg: Color::Gray,
  },
];

pub fn theme_index(name: &str) -> usize {
  THEMES.iter().position(|t| t.name.eq_ignore_ascii_case(name)).unwrap_or(0)
}
