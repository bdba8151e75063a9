//! Prompt construction per request intent
//!
//! Building a prompt cannot fail. Unless a reference date is pinned, each
//! build reads the current date. The analyze prompt carries a fixed
//! result-count instruction and a literal JSON skeleton; the schema validator
//! is configured from the same `PipelineConfig`, so the minimum it enforces
//! is the count requested here.

use chrono::{Datelike, NaiveDate, Utc};

use crate::config::{PipelineConfig, RequestedFields};
use crate::models::{AnalyzeRequest, Category, ImagePromptRequest, MarketingRequest, Request};

const SPANISH_MONTHS: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

/// Builds model prompts for every intent
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    result_count: usize,
    suppliers_per_opportunity: usize,
    fields: RequestedFields,
    /// Pinned date; `None` uses the current UTC date at build time
    reference_date: Option<NaiveDate>,
}

impl PromptBuilder {
    pub fn new(result_count: usize, fields: RequestedFields) -> Self {
        Self {
            result_count,
            suppliers_per_opportunity: 3,
            fields,
            reference_date: None,
        }
    }

    /// Builder configured from pipeline settings
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.result_count, config.requested_fields)
            .with_suppliers_per_opportunity(config.suppliers_per_opportunity)
    }

    /// Pin the date prompts refer to instead of reading the clock per build
    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }

    pub fn with_suppliers_per_opportunity(mut self, count: usize) -> Self {
        self.suppliers_per_opportunity = count;
        self
    }

    pub fn result_count(&self) -> usize {
        self.result_count
    }

    /// Build the prompt for a request
    pub fn build(&self, request: &Request) -> String {
        let date = self
            .reference_date
            .unwrap_or_else(|| Utc::now().date_naive());

        match request {
            Request::Analyze(analyze) => self.analyze_prompt(analyze, date),
            Request::Marketing(marketing) => self.marketing_prompt(marketing, date),
            Request::ImagePrompt(image) => self.image_prompt(image),
        }
    }

    fn analyze_prompt(&self, request: &AnalyzeRequest, reference_date: NaiveDate) -> String {
        let date = date_label(reference_date);
        let location = &request.location;
        let mut steps = vec![
            format!("Identifica la moneda oficial de {} y úsala para todos los montos.", location),
            format!(
                "Considera tendencias virales de {} en plataformas como TikTok, Instagram, Threads y LinkedIn.",
                reference_date.format("%Y")
            ),
            format!("Genera EXACTAMENTE {} oportunidades detalladas.", self.result_count),
            "Para cada oportunidad, incluye un \"referenceUrl\" que sea un enlace real de ejemplo (producto exitoso o noticia reciente)."
                .to_string(),
        ];

        if self.fields.suppliers && self.suppliers_per_opportunity > 0 {
            steps.push(format!(
                "PARA CADA OPORTUNIDAD, incluye EXACTAMENTE {} referencias de PROVEEDORES MAYORISTAS (Wholesale), internacionales o locales. Para cada proveedor indica nombre, URL del sitio web y días estimados de envío a {}.",
                self.suppliers_per_opportunity, location
            ));
        }

        steps.push("Devuelve el código ISO de la moneda y su símbolo actual.".to_string());

        let numbered = steps
            .iter()
            .enumerate()
            .map(|(i, step)| format!("{}. {}", i + 1, step))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "Analiza oportunidades de negocio reales y actualizadas a la fecha actual ({date}) para una inversión inicial de {amount} en la moneda local de {location}.\n\
             El análisis debe enfocarse en oportunidades {qualifier}.\n\n\
             PASOS IMPORTANTES:\n{numbered}\n\n\
             Devuelve un JSON estrictamente siguiendo este esquema:\n{schema}\n\n\
             Responde ÚNICAMENTE con el objeto JSON válido, sin bloques de código markdown ni texto adicional.",
            date = date,
            amount = format_amount(request.investment_amount),
            location = location,
            qualifier = category_qualifier(request.category),
            numbered = numbered,
            schema = self.schema_skeleton(),
        )
    }

    fn marketing_prompt(&self, request: &MarketingRequest, reference_date: NaiveDate) -> String {
        format!(
            "Genera un guion de ventas persuasivo y 3 copys para redes sociales optimizados para el mercado de {date} para el siguiente producto de negocio:\n\
             Título: {title}\n\
             Descripción: {description}\n\
             Estrategia sugerida: {strategy}\n\n\
             El tono debe ser innovador y extremadamente atractivo para clientes finales. Incluye emojis de tendencia y una estructura de alta conversión.",
            date = date_label(reference_date),
            title = request.title,
            description = request.description,
            strategy = request.strategy,
        )
    }

    fn image_prompt(&self, request: &ImagePromptRequest) -> String {
        format!(
            "Basado en el siguiente guion de ventas, crea un PROMPT de generación de imagen (estilo Midjourney/DALL-E) que represente visualmente la esencia de esta oferta comercial moderna.\n\
             REGLA: Responde ÚNICAMENTE con el prompt en INGLÉS, descriptivo, detallando estilo 4k, iluminación cinematográfica y composición premium. Sin texto en la imagen.\n\n\
             GUION:\n{script}\n\n\
             PROMPT:",
            script = request.source_text,
        )
    }

    /// Literal JSON skeleton listing exactly the requested fields
    fn schema_skeleton(&self) -> String {
        let mut fields = vec![
            r#"        "id": "string""#.to_string(),
            r#"        "title": "string""#.to_string(),
            r#"        "description": "string""#.to_string(),
            r#"        "initialInvestment": number"#.to_string(),
            r#"        "expectedROI": "string""#.to_string(),
            r#"        "difficulty": "Baja" | "Media" | "Alta""#.to_string(),
        ];

        for (requested, name) in [
            (self.fields.trends, "trends"),
            (self.fields.pros, "pros"),
            (self.fields.cons, "cons"),
        ] {
            if requested {
                fields.push(format!(r#"        "{}": ["string"]"#, name));
            }
        }

        fields.push(r#"        "marketingStrategy": "string""#.to_string());
        fields.push(r#"        "referenceUrl": "string""#.to_string());

        if self.fields.suppliers {
            fields.push(
                r#"        "suppliers": [
          { "name": "string", "url": "string", "shippingDays": "string" }
        ]"#
                .to_string(),
            );
        }

        format!(
            "{{\n  \"marketOverview\": \"string\",\n  \"currencySymbol\": \"string\",\n  \"currencyCode\": \"string\",\n  \"opportunities\": [\n    {{\n{}\n    }}\n  ]\n}}",
            fields.join(",\n")
        )
    }
}

fn date_label(date: NaiveDate) -> String {
    let month = SPANISH_MONTHS[date.month0() as usize];
    format!("{} de {}", month, date.year())
}

fn category_qualifier(category: Category) -> &'static str {
    match category {
        Category::Products => "específicamente centradas en la VENTA DE PRODUCTOS (e-commerce, dropshipping, venta directa, Amazon, TikTok Shop, productos físicos o digitales)",
        Category::General => "de negocio generales (servicios, modelos de suscripción, franquicias modernas, startups o modelos híbridos)",
    }
}

/// Whole amounts render without a trailing `.0`
fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 && amount.abs() < 1e15 {
        format!("{}", amount as i64)
    } else {
        format!("{}", amount)
    }
}
