//! PDF export of the rendered portfolio view.
//!
//! The view is flattened into styled text lines, word-wrapped with a
//! monospaced metric and sliced into fixed-height A4 pages. All measurements
//! are in PDF points unless the name says otherwise.

use folio_api::models::portfolio::Portfolio;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

use crate::error::ClientError;

const PT_PER_MM: f32 = 72.0 / 25.4;
pub const PAGE_WIDTH_MM: f32 = 210.0;
/// Slice height per page.
pub const PAGE_HEIGHT_MM: f32 = 295.0;
const MARGIN_MM: f32 = 15.0;
/// Courier advance width in em.
const GLYPH_WIDTH_EM: f32 = 0.6;
const LEADING: f32 = 1.4;

// ────────────────────────────────────────────────────────────────────────────
// Rendered view
// ────────────────────────────────────────────────────────────────────────────

/// Sections of the view, in display order. Empty ones are not rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Summary,
    Experience,
    Education,
    Skills,
    Certificates,
    Projects,
}

impl Section {
    pub fn title(self) -> &'static str {
        match self {
            Section::Summary => "Professional Summary",
            Section::Experience => "Work Experience",
            Section::Education => "Education",
            Section::Skills => "Skills",
            Section::Certificates => "Certificates",
            Section::Projects => "Projects",
        }
    }
}

/// Populated sections of `portfolio`, in display order.
pub fn populated_sections(portfolio: &Portfolio) -> Vec<Section> {
    [
        (Section::Summary, !portfolio.summary.trim().is_empty()),
        (Section::Experience, !portfolio.experience.is_empty()),
        (Section::Education, !portfolio.education.is_empty()),
        (Section::Skills, !portfolio.skills.is_empty()),
        (Section::Certificates, !portfolio.certificates.is_empty()),
        (Section::Projects, !portfolio.projects.is_empty()),
    ]
    .into_iter()
    .filter_map(|(section, shown)| shown.then_some(section))
    .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    Name,
    Heading,
    Subheading,
    Body,
    Muted,
    /// Vertical gap; carries no text.
    Gap,
}

impl LineStyle {
    fn font_size(self) -> f32 {
        match self {
            LineStyle::Name => 20.0,
            LineStyle::Heading => 14.0,
            LineStyle::Subheading => 11.0,
            LineStyle::Body => 10.0,
            LineStyle::Muted => 9.0,
            LineStyle::Gap => 6.0,
        }
    }

    fn height(self) -> f32 {
        self.font_size() * LEADING
    }

    fn font_key(self) -> &'static str {
        match self {
            LineStyle::Name | LineStyle::Heading | LineStyle::Subheading => "F2",
            _ => "F1",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub style: LineStyle,
    pub text: String,
}

impl Line {
    fn new(style: LineStyle, text: impl Into<String>) -> Self {
        Self {
            style,
            text: text.into(),
        }
    }

    fn gap() -> Self {
        Self::new(LineStyle::Gap, "")
    }
}

fn or_placeholder<'a>(value: &'a str, placeholder: &'a str) -> &'a str {
    if value.trim().is_empty() {
        placeholder
    } else {
        value
    }
}

/// Flattens the view into unwrapped lines.
pub fn render_view(portfolio: &Portfolio) -> Vec<Line> {
    let info = &portfolio.personal_info;
    let mut lines = vec![Line::new(
        LineStyle::Name,
        or_placeholder(&info.full_name, "Your Name"),
    )];

    let contact: Vec<&str> = [&info.email, &info.phone, &info.address]
        .into_iter()
        .map(String::as_str)
        .filter(|s| !s.trim().is_empty())
        .collect();
    if !contact.is_empty() {
        lines.push(Line::new(LineStyle::Muted, contact.join(" | ")));
    }
    for (label, link) in [
        ("LinkedIn", &info.linkedin),
        ("GitHub", &info.github),
        ("Website", &info.website),
    ] {
        if !link.trim().is_empty() {
            lines.push(Line::new(LineStyle::Muted, format!("{label}: {link}")));
        }
    }

    for section in populated_sections(portfolio) {
        lines.push(Line::gap());
        lines.push(Line::new(LineStyle::Heading, section.title()));
        match section {
            Section::Summary => lines.push(Line::new(LineStyle::Body, &portfolio.summary)),
            Section::Experience => {
                for exp in &portfolio.experience {
                    lines.push(Line::new(
                        LineStyle::Subheading,
                        or_placeholder(&exp.title, "Job Title"),
                    ));
                    lines.push(Line::new(
                        LineStyle::Muted,
                        format!(
                            "{} - {}",
                            exp.start_date,
                            or_placeholder(&exp.end_date, "Present")
                        ),
                    ));
                    if !exp.company.trim().is_empty() {
                        lines.push(Line::new(LineStyle::Body, &exp.company));
                    }
                    if !exp.description.trim().is_empty() {
                        lines.push(Line::new(LineStyle::Body, &exp.description));
                    }
                }
            }
            Section::Education => {
                for edu in &portfolio.education {
                    lines.push(Line::new(
                        LineStyle::Subheading,
                        or_placeholder(&edu.degree, "Degree"),
                    ));
                    let mut where_when = or_placeholder(&edu.institution, "Institution").to_string();
                    if !edu.year.trim().is_empty() {
                        where_when.push_str(&format!(" - {}", edu.year));
                    }
                    lines.push(Line::new(LineStyle::Muted, where_when));
                }
            }
            Section::Skills => {
                lines.push(Line::new(LineStyle::Body, portfolio.skills.join(", ")));
            }
            Section::Certificates => {
                for cert in &portfolio.certificates {
                    lines.push(Line::new(LineStyle::Body, format!("- {}", cert.name)));
                }
            }
            Section::Projects => {
                for project in &portfolio.projects {
                    lines.push(Line::new(
                        LineStyle::Subheading,
                        or_placeholder(&project.name, "Project Name"),
                    ));
                    if !project.link.trim().is_empty() {
                        lines.push(Line::new(LineStyle::Muted, &project.link));
                    }
                    if !project.description.trim().is_empty() {
                        lines.push(Line::new(LineStyle::Body, &project.description));
                    }
                }
            }
        }
    }
    lines
}

// ────────────────────────────────────────────────────────────────────────────
// Layout
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    pub margin: f32,
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self {
            width: PAGE_WIDTH_MM * PT_PER_MM,
            height: PAGE_HEIGHT_MM * PT_PER_MM,
            margin: MARGIN_MM * PT_PER_MM,
        }
    }
}

impl PageGeometry {
    fn text_width(&self) -> f32 {
        self.width - 2.0 * self.margin
    }

    fn text_height(&self) -> f32 {
        self.height - 2.0 * self.margin
    }

    /// Glyphs that fit on one line at the given style.
    fn chars_per_line(&self, style: LineStyle) -> usize {
        ((self.text_width() / (style.font_size() * GLYPH_WIDTH_EM)).floor() as usize).max(1)
    }
}

/// A line positioned on a page; `baseline` is measured from the page bottom.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub style: LineStyle,
    pub text: String,
    pub baseline: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub lines: Vec<PlacedLine>,
}

/// Greedy word wrap to `width` glyphs. Words longer than a line are split.
/// Embedded newlines always break.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut out = Vec::new();
    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > width {
                if !current.is_empty() {
                    out.push(std::mem::take(&mut current));
                }
                out.push(word.drain(..width).collect());
            }
            let word: String = word.into_iter().collect();
            if word.is_empty() {
                continue;
            }
            let needed = if current.is_empty() {
                word.chars().count()
            } else {
                current.chars().count() + 1 + word.chars().count()
            };
            if needed > width {
                out.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&word);
        }
        if !current.is_empty() {
            out.push(current);
        }
    }
    out
}

/// Wraps every line and slices the result into fixed-height pages.
/// A page never starts with a gap.
pub fn paginate(lines: &[Line], geometry: &PageGeometry) -> Vec<Page> {
    let top = geometry.height - geometry.margin;
    let usable = geometry.text_height();

    let mut pages = vec![Page::default()];
    let mut used = 0.0_f32;

    for line in lines {
        let rows = if line.style == LineStyle::Gap {
            vec![String::new()]
        } else {
            wrap_text(&line.text, geometry.chars_per_line(line.style))
        };

        for row in rows {
            let height = line.style.height();
            if used + height > usable && used > 0.0 {
                pages.push(Page::default());
                used = 0.0;
            }
            if line.style == LineStyle::Gap {
                if used > 0.0 {
                    used += height;
                }
                continue;
            }
            used += height;
            if let Some(page) = pages.last_mut() {
                page.lines.push(PlacedLine {
                    style: line.style,
                    text: row,
                    baseline: top - used + (height - line.style.font_size()),
                });
            }
        }
    }
    pages
}

// ────────────────────────────────────────────────────────────────────────────
// PDF output
// ────────────────────────────────────────────────────────────────────────────

/// `<fullName>_Resume.pdf`, or `Portfolio_Resume.pdf` without a name.
pub fn pdf_file_name(portfolio: &Portfolio) -> String {
    let name = portfolio.personal_info.full_name.trim();
    if name.is_empty() {
        return "Portfolio_Resume.pdf".to_string();
    }
    let safe: String = name
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':' | '\0') { '_' } else { c })
        .collect();
    format!("{safe}_Resume.pdf")
}

/// Renders the view of `portfolio` as a paginated PDF document.
pub fn render_pdf(portfolio: &Portfolio) -> Result<Vec<u8>, ClientError> {
    let geometry = PageGeometry::default();
    let pages = paginate(&render_view(portfolio), &geometry);
    write_pdf(&pages, &geometry)
}

fn write_pdf(pages: &[Page], geometry: &PageGeometry) -> Result<Vec<u8>, ClientError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular,
            "F2" => bold,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for page in pages {
        let content = page_content(page, geometry);
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id: ObjectId = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let page_count = kids.len() as i64;
    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => page_count,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), geometry.width.into(), geometry.height.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)?;
    Ok(buffer)
}

fn page_content(page: &Page, geometry: &PageGeometry) -> Content {
    let mut operations = Vec::with_capacity(page.lines.len() * 5);
    for line in &page.lines {
        operations.push(Operation::new("BT", vec![]));
        operations.push(Operation::new(
            "Tf",
            vec![line.style.font_key().into(), line.style.font_size().into()],
        ));
        operations.push(Operation::new(
            "Td",
            vec![geometry.margin.into(), line.baseline.into()],
        ));
        operations.push(Operation::new(
            "Tj",
            vec![Object::string_literal(win_ansi(&line.text))],
        ));
        operations.push(Operation::new("ET", vec![]));
    }
    Content { operations }
}

/// Latin-1 subset of the text; anything outside it becomes `?`.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_api::models::portfolio::{ExperienceEntry, PersonalInfo, ProjectEntry};

    fn sample() -> Portfolio {
        Portfolio {
            personal_info: PersonalInfo {
                full_name: "Ada Lovelace".to_string(),
                email: "ada@example.com".to_string(),
                github: "github.com/ada".to_string(),
                ..Default::default()
            },
            summary: "Analyst of engines.".to_string(),
            experience: vec![ExperienceEntry {
                title: "Analyst".to_string(),
                company: "Babbage & Co".to_string(),
                start_date: "1842".to_string(),
                ..Default::default()
            }],
            skills: vec!["Mathematics".to_string(), "Notes".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_populated_sections_skip_empty() {
        assert_eq!(
            populated_sections(&sample()),
            vec![Section::Summary, Section::Experience, Section::Skills]
        );
        assert!(populated_sections(&Portfolio::default()).is_empty());
    }

    #[test]
    fn test_render_view_uses_placeholders() {
        let portfolio = Portfolio {
            projects: vec![ProjectEntry::default()],
            ..Default::default()
        };
        let lines = render_view(&portfolio);
        assert_eq!(lines[0], Line::new(LineStyle::Name, "Your Name"));
        assert!(lines.contains(&Line::new(LineStyle::Subheading, "Project Name")));
    }

    #[test]
    fn test_render_view_open_ended_experience() {
        let lines = render_view(&sample());
        assert!(lines.contains(&Line::new(LineStyle::Muted, "1842 - Present")));
        assert!(lines.contains(&Line::new(LineStyle::Muted, "GitHub: github.com/ada")));
        assert!(lines.contains(&Line::new(LineStyle::Body, "Mathematics, Notes")));
    }

    #[test]
    fn test_wrap_text_respects_width() {
        let rows = wrap_text("the quick brown fox jumps", 10);
        assert_eq!(rows, vec!["the quick", "brown fox", "jumps"]);
        assert!(rows.iter().all(|r| r.chars().count() <= 10));
    }

    #[test]
    fn test_wrap_text_splits_long_words_and_newlines() {
        assert_eq!(wrap_text("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
        assert_eq!(wrap_text("one\ntwo", 20), vec!["one", "two"]);
        assert!(wrap_text("   ", 5).is_empty());
    }

    #[test]
    fn test_paginate_short_view_fits_one_page() {
        let pages = paginate(&render_view(&sample()), &PageGeometry::default());
        assert_eq!(pages.len(), 1);
        let first = &pages[0].lines[0];
        assert_eq!(first.text, "Ada Lovelace");
        let baselines: Vec<f32> = pages[0].lines.iter().map(|l| l.baseline).collect();
        assert!(baselines.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn test_paginate_long_view_spills_to_more_pages() {
        let mut portfolio = sample();
        portfolio.summary = "word ".repeat(3000);
        let geometry = PageGeometry::default();
        let pages = paginate(&render_view(&portfolio), &geometry);
        assert!(pages.len() > 1);
        for page in &pages {
            assert!(!page.lines.is_empty());
            assert!(page.lines.iter().all(|l| l.baseline >= geometry.margin - 1.0));
        }
    }

    #[test]
    fn test_render_pdf_page_count_matches_layout() {
        let mut portfolio = sample();
        portfolio.summary = "word ".repeat(3000);
        let expected = paginate(&render_view(&portfolio), &PageGeometry::default()).len();

        let bytes = render_pdf(&portfolio).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), expected);
    }

    #[test]
    fn test_pdf_file_name() {
        assert_eq!(pdf_file_name(&sample()), "Ada Lovelace_Resume.pdf");
        assert_eq!(pdf_file_name(&Portfolio::default()), "Portfolio_Resume.pdf");
    }

    #[test]
    fn test_win_ansi_replaces_wide_chars() {
        assert_eq!(win_ansi("café ✓"), b"caf\xe9 ?".to_vec());
    }
}
