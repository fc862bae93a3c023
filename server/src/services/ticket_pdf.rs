//! Printable tickets: one PDF per order, two tickets per US Letter page.
//! Each ticket carries the event, ticket type, holder, ticket number and a
//! vector QR code of the ticket payload.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

use crate::models::ticket::TicketDetail;
use crate::services::qr::QrModules;
use crate::utils::error::AppError;

const PAGE_WIDTH: f32 = 612.0;
const PAGE_HEIGHT: f32 = 792.0;
const INCH: f32 = 72.0;
const TICKETS_PER_PAGE: usize = 2;

const TICKET_X: f32 = 0.5 * INCH;
const TICKET_WIDTH: f32 = 7.5 * INCH;
const TICKET_HEIGHT: f32 = 3.0 * INCH;
const TICKET_PITCH: f32 = 3.8 * INCH;
const QR_BOX: f32 = 2.0 * INCH;
const QR_PADDING: f32 = 0.1 * INCH;

const REGULAR: &str = "F1";
const BOLD: &str = "F2";

type Rgb = (f32, f32, f32);

const BACKGROUND: Rgb = (0.1, 0.1, 0.15);
const PURPLE: Rgb = (0.4, 0.25, 0.6);
const GOLD: Rgb = (0.95, 0.8, 0.2);
const WHITE: Rgb = (1.0, 1.0, 1.0);
const GREY: Rgb = (0.7, 0.7, 0.7);
const BLACK: Rgb = (0.0, 0.0, 0.0);

/// Attachment name used for an order's tickets.
pub fn tickets_filename(order_number: &str) -> String {
    format!("Tickets_{}.pdf", order_number)
}

/// Standard Type1 fonts only cover Latin-1; anything else is replaced.
fn pdf_text(value: &str, max_chars: usize) -> String {
    value
        .chars()
        .take(max_chars)
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else { '?' })
        .collect()
}

fn wrap(value: &str, max_len: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in value.split_whitespace() {
        if !current.is_empty() && current.len() + 1 + word.len() > max_len {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

struct Canvas {
    ops: Vec<Operation>,
}

impl Canvas {
    fn new() -> Self {
        Self { ops: Vec::new() }
    }

    fn fill_color(&mut self, (r, g, b): Rgb) {
        self.ops
            .push(Operation::new("rg", vec![r.into(), g.into(), b.into()]));
    }

    fn rect(&mut self, color: Rgb, x: f32, y: f32, w: f32, h: f32) {
        self.fill_color(color);
        self.ops
            .push(Operation::new("re", vec![x.into(), y.into(), w.into(), h.into()]));
        self.ops.push(Operation::new("f", vec![]));
    }

    fn text(&mut self, color: Rgb, font: &str, size: f32, x: f32, y: f32, value: &str) {
        self.fill_color(color);
        self.ops.push(Operation::new("BT", vec![]));
        self.ops
            .push(Operation::new("Tf", vec![font.into(), size.into()]));
        self.ops.push(Operation::new("Td", vec![x.into(), y.into()]));
        self.ops
            .push(Operation::new("Tj", vec![Object::string_literal(value)]));
        self.ops.push(Operation::new("ET", vec![]));
    }

    fn qr(&mut self, modules: &QrModules, x: f32, y: f32, size: f32) {
        let cell = size / modules.width as f32;
        self.fill_color(BLACK);
        for row in 0..modules.width {
            for col in 0..modules.width {
                if modules.is_dark(col, row) {
                    let left = x + col as f32 * cell;
                    let bottom = y + size - (row + 1) as f32 * cell;
                    self.ops.push(Operation::new(
                        "re",
                        vec![left.into(), bottom.into(), cell.into(), cell.into()],
                    ));
                }
            }
        }
        self.ops.push(Operation::new("f", vec![]));
    }

    fn draw_ticket(&mut self, detail: &TicketDetail, y: f32) -> Result<(), AppError> {
        let ticket = &detail.ticket;
        let x = TICKET_X;

        self.rect(BACKGROUND, x, y, TICKET_WIDTH, TICKET_HEIGHT);
        self.rect(PURPLE, x, y + TICKET_HEIGHT - 0.5 * INCH, TICKET_WIDTH, 0.5 * INCH);
        self.rect(PURPLE, x, y, TICKET_WIDTH, 0.3 * INCH);

        let left = x + 0.3 * INCH;
        let title_y = y + TICKET_HEIGHT - 0.8 * INCH;
        self.text(WHITE, BOLD, 20.0, left, title_y, &pdf_text(&detail.event_title, 35));

        let badge_y = title_y - 0.5 * INCH;
        self.rect(GOLD, left, badge_y, 1.5 * INCH, 0.3 * INCH);
        self.text(
            BACKGROUND,
            BOLD,
            12.0,
            left + 0.1 * INCH,
            badge_y + 0.08 * INCH,
            &pdf_text(&detail.ticket_type_name.to_uppercase(), 18),
        );

        let date = detail.event_date.format("%B %d, %Y").to_string();
        let time = detail.event_date.format("%I:%M %p UTC").to_string();
        self.text(WHITE, REGULAR, 11.0, left, badge_y - 0.35 * INCH, &date);
        self.text(WHITE, REGULAR, 11.0, left, badge_y - 0.6 * INCH, &time);

        let mut location_y = badge_y - 0.85 * INCH;
        for line in wrap(&detail.event_location, 40).iter().take(2) {
            self.text(WHITE, REGULAR, 10.0, left, location_y, &pdf_text(line, 40));
            location_y -= 0.2 * INCH;
        }

        self.text(WHITE, BOLD, 11.0, left, y + 0.5 * INCH, "TICKET HOLDER:");
        self.text(
            WHITE,
            REGULAR,
            11.0,
            left + 1.3 * INCH,
            y + 0.5 * INCH,
            &pdf_text(&ticket.holder_name, 40),
        );

        let qr_x = x + TICKET_WIDTH - 2.5 * INCH;
        let qr_y = y + 0.4 * INCH;
        self.rect(WHITE, qr_x, qr_y, QR_BOX, QR_BOX);
        let modules = QrModules::encode(&ticket.qr_payload())?;
        self.qr(
            &modules,
            qr_x + QR_PADDING,
            qr_y + QR_PADDING,
            QR_BOX - 2.0 * QR_PADDING,
        );

        self.text(WHITE, REGULAR, 8.0, qr_x + 0.35 * INCH, qr_y - 0.2 * INCH, &ticket.ticket_number);
        self.text(
            GREY,
            REGULAR,
            7.0,
            qr_x + 0.25 * INCH,
            y + 0.1 * INCH,
            "Present this QR code at entrance",
        );
        Ok(())
    }
}

fn pdf_error(e: impl std::fmt::Display) -> AppError {
    AppError::InternalServerError(format!("Failed to render ticket PDF: {}", e))
}

/// Renders every ticket of an order into one document.
pub fn order_tickets_pdf(tickets: &[TicketDetail]) -> Result<Vec<u8>, AppError> {
    if tickets.is_empty() {
        return Err(AppError::ValidationError("Order has no tickets".to_string()));
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            REGULAR => regular_id,
            BOLD => bold_id,
        },
    });

    let mut kids: Vec<ObjectId> = Vec::new();
    for page in tickets.chunks(TICKETS_PER_PAGE) {
        let mut canvas = Canvas::new();
        for (slot, detail) in page.iter().enumerate() {
            let y = PAGE_HEIGHT - (slot + 1) as f32 * TICKET_PITCH;
            canvas.draw_ticket(detail, y)?;
        }
        let content = Content { operations: canvas.ops };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().map_err(pdf_error)?,
        ));
        kids.push(doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        }));
    }

    let pages = dictionary! {
        "Type" => "Pages",
        "Count" => kids.len() as i64,
        "Kids" => kids.into_iter().map(Object::from).collect::<Vec<Object>>(),
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).map_err(pdf_error)?;
    Ok(bytes)
}
