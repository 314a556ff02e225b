use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

const COMPONENTS: [&str; 9] = ["IRPJ", "CSLL", "PIS", "COFINS", "ISS", "CPP", "CBS", "IBS", "IS"];

/// Format output as tables using the tabled crate.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => {
            print_summary(map);
            if let Some(Value::Array(regimes)) = map.get("regimes") {
                println!();
                print_regimes(regimes);
                println!();
                print_monthly_matrix(regimes);
            } else if let Some(Value::Array(months)) = map.get("baseMensal") {
                println!();
                print_months(months);
            }
        }
        _ => println!("{}", format_value(value)),
    }
}

/// Scalar fields of the response as a Field/Value table.
fn print_summary(map: &Map<String, Value>) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in map {
        if val.is_array() || val.is_object() {
            continue;
        }
        builder.push_record([key.as_str(), &format_value(val)]);
    }
    println!("{}", Table::from(builder));
}

fn print_regimes(regimes: &[Value]) {
    let mut builder = Builder::default();
    let mut header = vec!["Regime", "Imposto anual", "Alíquota"];
    header.extend(COMPONENTS);
    builder.push_record(header);

    for regime in regimes {
        let mut row = vec![
            field(regime, "nome"),
            field(regime, "impostoTotalAnual"),
            field(regime, "aliquotaEfetiva"),
        ];
        let details = regime.get("detalhesTributos");
        for component in COMPONENTS {
            row.push(
                details
                    .and_then(|d| d.get(component))
                    .map(format_value)
                    .unwrap_or_default(),
            );
        }
        builder.push_record(row);
    }
    println!("{}", Table::from(builder));

    for regime in regimes {
        let note = field(regime, "observacoes");
        if !note.is_empty() {
            println!("  - {}: {}", field(regime, "nome"), note);
        }
    }
}

/// One row per month, one column per regime.
fn print_monthly_matrix(regimes: &[Value]) {
    let mut builder = Builder::default();
    let mut header = vec!["Mês".to_string()];
    header.extend(regimes.iter().map(|r| field(r, "nome")));
    builder.push_record(header);

    for month in 0..12 {
        let mut row = vec![(month + 1).to_string()];
        for regime in regimes {
            let amount = regime
                .get("impostoTotalMensal")
                .and_then(|m| m.get(month))
                .and_then(|m| m.get("valor"))
                .map(format_value)
                .unwrap_or_default();
            row.push(amount);
        }
        builder.push_record(row);
    }
    println!("{}", Table::from(builder));
}

fn print_months(months: &[Value]) {
    let headers = [
        "ano",
        "mes",
        "receitaBruta",
        "folhaSalarios",
        "lucroLiquidoContabil",
        "insumosCreditoPisCofins",
    ];
    let mut builder = Builder::default();
    builder.push_record(headers);
    for month in months {
        builder.push_record(headers.iter().map(|h| field(month, h)));
    }
    println!("{}", Table::from(builder));
}

fn field(value: &Value, key: &str) -> String {
    value.get(key).map(format_value).unwrap_or_default()
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(format_value).collect();
            items.join(", ")
        }
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}
