//! TypeScript text rendering for generated units.

use std::fmt::Write as _;

use serde::Serialize;

use crate::literal;
use crate::model_type::{ModelTypeUnit, TypeDeclaration};

/// The first line of every generated module.
pub const HEADER: &str = "// This file is generated by modeltype. Do not edit it by hand.";

const INDENT: &str = "  ";

/// Renders a complete `models.ts` module: the header followed by every unit
/// in the given order.
pub fn render_module(units: &[ModelTypeUnit]) -> String {
    let mut code = String::new();
    code.push_str(HEADER);
    code.push('\n');
    for unit in units {
        code.push('\n');
        code.push_str(&render_unit(unit));
    }
    code
}

/// Renders the declarations of one unit.
pub fn render_unit(unit: &ModelTypeUnit) -> String {
    let names = &unit.names;
    let mut code = String::new();

    render_interface(&mut code, &names.fields, &unit.interface);
    code.push('\n');

    let _ = writeln!(
        code,
        "export interface {} extends {} {{",
        names.model, names.fields
    );
    for member in &unit.relations {
        let _ = writeln!(code, "{INDENT}{};", member.render());
    }
    for accessor in &unit.reverse_relations {
        let _ = writeln!(
            code,
            "{INDENT}{}(lookups?: {}): {};",
            literal::property_key(&accessor.name),
            accessor.lookups_type,
            accessor.queryset_name
        );
    }
    let _ = writeln!(
        code,
        "{INDENT}update(data: Partial<{}>): Promise<{}>;",
        names.fields, names.model
    );
    let _ = writeln!(code, "{INDENT}delete(): Promise<void>;");
    for method in unit.methods.iter().filter(|m| !m.is_static) {
        let _ = writeln!(code, "{INDENT}{};", method.render());
    }
    code.push_str("}\n\n");

    render_interface(&mut code, &names.lookups, &unit.lookups);
    code.push('\n');

    let _ = writeln!(
        code,
        "export type {} =\n{INDENT}{};",
        names.prefetch_key,
        unit.prefetch_type()
    );
    code.push('\n');

    let _ = writeln!(code, "export interface {} {{", names.queryset);
    let _ = writeln!(code, "{INDENT}filter(lookups: {}): {};", names.lookups, names.queryset);
    let _ = writeln!(code, "{INDENT}exclude(lookups: {}): {};", names.lookups, names.queryset);
    let _ = writeln!(
        code,
        "{INDENT}orderBy(...fields: (keyof {} & string)[]): {};",
        names.fields, names.queryset
    );
    let _ = writeln!(
        code,
        "{INDENT}prefetch(...keys: {}[]): {};",
        names.prefetch_key, names.queryset
    );
    let _ = writeln!(
        code,
        "{INDENT}values(...fields: (keyof {} & string)[]): {};",
        names.fields, names.queryset
    );
    let _ = writeln!(code, "{INDENT}fetch(): Promise<{}[]>;", names.model);
    let _ = writeln!(code, "{INDENT}get(pk: {}): Promise<{}>;", unit.pk_type, names.model);
    let _ = writeln!(code, "{INDENT}count(): Promise<number>;");
    let _ = writeln!(code, "{INDENT}exists(): Promise<boolean>;");
    let _ = writeln!(
        code,
        "{INDENT}create(data: Partial<{}>): Promise<{}>;",
        names.fields, names.model
    );
    let _ = writeln!(
        code,
        "{INDENT}getOrCreate(lookups: {}, defaults?: Partial<{}>): Promise<[{}, boolean]>;",
        names.lookups, names.fields, names.model
    );
    for method in unit.methods.iter().filter(|m| m.is_static) {
        let _ = writeln!(code, "{INDENT}{};", method.render());
    }
    code.push_str("}\n\n");

    let _ = writeln!(code, "export const {} = {{", names.fields_schema);
    for entry in &unit.schema {
        let _ = writeln!(
            code,
            "{INDENT}{}: {},",
            literal::property_key(&entry.field_name),
            literal_of(entry)
        );
    }
    code.push_str("} as const;\n");
    code
}

fn render_interface(code: &mut String, name: &str, members: &[TypeDeclaration]) {
    let _ = writeln!(code, "export interface {name} {{");
    for member in members {
        let _ = writeln!(code, "{INDENT}{};", member.render());
    }
    code.push_str("}\n");
}

fn literal_of<T: Serialize>(value: &T) -> String {
    serde_json::to_value(value).map_or_else(|_| "{}".to_string(), |v| literal::transpile(&v))
}
