use serde_json::Value;
use std::io;

const REGIME_FIELDS: [&str; 3] = ["nome", "impostoTotalAnual", "aliquotaEfetiva"];
const COMPONENTS: [&str; 9] = ["IRPJ", "CSLL", "PIS", "COFINS", "ISS", "CPP", "CBS", "IBS", "IS"];
const MONTH_FIELDS: [&str; 8] = [
    "ano",
    "mes",
    "receitaBruta",
    "folhaSalarios",
    "lucroLiquidoContabil",
    "insumosCreditoPisCofins",
    "retencaoIRPJ",
    "retencaoCSLL",
];

/// Write output as CSV to stdout: one row per regime for a simulation, one
/// row per month for a completed series.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    if let Some(Value::Array(regimes)) = value.get("regimes") {
        let mut header: Vec<&str> = REGIME_FIELDS.to_vec();
        header.extend(COMPONENTS);
        header.push("recomendado");
        let _ = wtr.write_record(&header);

        let recommended = value.get("recomendado").and_then(Value::as_str).unwrap_or_default();
        for regime in regimes {
            let mut row: Vec<String> = REGIME_FIELDS.iter().map(|f| field(regime, f)).collect();
            let details = regime.get("detalhesTributos");
            for component in COMPONENTS {
                row.push(
                    details
                        .and_then(|d| d.get(component))
                        .map(format_csv_value)
                        .unwrap_or_default(),
                );
            }
            row.push((field(regime, "nome") == recommended).to_string());
            let _ = wtr.write_record(&row);
        }
    } else if let Some(Value::Array(months)) = value.get("baseMensal") {
        let _ = wtr.write_record(MONTH_FIELDS);
        for month in months {
            let row: Vec<String> = MONTH_FIELDS.iter().map(|f| field(month, f)).collect();
            let _ = wtr.write_record(&row);
        }
    } else if let Value::Object(map) = value {
        let _ = wtr.write_record(["field", "value"]);
        for (key, val) in map {
            let _ = wtr.write_record([key.as_str(), &format_csv_value(val)]);
        }
    } else {
        let _ = wtr.write_record([&format_csv_value(value)]);
    }

    let _ = wtr.flush();
}

fn field(value: &Value, key: &str) -> String {
    value.get(key).map(format_csv_value).unwrap_or_default()
}

fn format_csv_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
