//! C++ backend.
//!
//! Output is meant to be `#include`d by a hand-written decoder that defines
//! `nonp_context` (with `header` and `inst.opcode` members):
//!
//! ```text
//! opcode.h          enum Opcode { INVALID, O_..., OPCODE_COUNT }
//! opcode_strings.i  g_opcode_names[Opcode::OPCODE_COUNT]
//! nonp_tables.i     decode_idx_XX chains and the g_nonp_tables dispatch table
//! protos.cpp        decode_nonp_<tag> routine stubs
//! ```

use std::fmt::Write;

use super::{hex_digits, Backend, EmitError, GeneratedFile};
use crate::tablegen::{CompiledUnit, FieldTag};

const CONTEXT_TYPE: &str = "nonp_context";
const ROUTINE_PREFIX: &str = "decode_nonp_";
const CHAIN_PREFIX: &str = "decode_idx_";
const TABLE_NAME: &str = "g_nonp_tables";
const NAMES_TABLE: &str = "g_opcode_names";

/// Renders the dispatch tables as C++ sources.
#[derive(Debug, Clone)]
pub struct CppBackend {
    namespace: String,
}

impl CppBackend {
    pub fn new(namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
        }
    }

    fn header_guard(&self) -> String {
        let ns: String = self
            .namespace
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
            .collect();
        format!("{}_OPCODE_H", ns)
    }

    fn render_opcode_enum(&self, unit: &CompiledUnit) -> Result<String, EmitError> {
        let guard = self.header_guard();
        let mut out = String::new();

        writeln!(out, "#ifndef {}", guard)?;
        writeln!(out, "#define {}", guard)?;
        writeln!(out, "#include <cstdint>")?;
        writeln!(out)?;
        writeln!(out, "namespace {}", self.namespace)?;
        writeln!(out, "{{")?;
        writeln!(out, "\tenum Opcode")?;
        writeln!(out, "\t{{")?;
        let rows: Vec<String> = unit.opcodes.names().iter().map(|n| format!("\t\t{}", n)).collect();
        writeln!(out, "{}", rows.join(",\n"))?;
        writeln!(out, "\t}};")?;
        writeln!(out)?;
        writeln!(out, "}} // namespace")?;
        writeln!(out)?;
        writeln!(out, "#endif // {}", guard)?;
        Ok(out)
    }

    fn render_opcode_strings(&self, unit: &CompiledUnit) -> Result<String, EmitError> {
        let mut out = String::new();

        writeln!(out, "namespace {}", self.namespace)?;
        writeln!(out, "{{")?;
        writeln!(out, "\tconst char* {}[Opcode::OPCODE_COUNT] =", NAMES_TABLE)?;
        writeln!(out, "\t{{")?;
        let rows: Vec<String> = unit
            .opcodes
            .indexed_names(&unit.options.opcode_prefix)
            .iter()
            .map(|n| format!("\t\t\"{}\"", n))
            .collect();
        writeln!(out, "{}", rows.join(",\n"))?;
        writeln!(out, "\t}};")?;
        writeln!(out, "}} // namespace")?;
        Ok(out)
    }

    fn render_tables(&self, unit: &CompiledUnit) -> Result<String, EmitError> {
        let table = &unit.table;
        let digits = hex_digits(table.width);
        let slot_digits = hex_digits(table.top_bits as usize).max(2);
        let mut out = String::new();

        writeln!(out, "// DO NOT EDIT")?;
        writeln!(out, "// Generated by decodegen")?;
        writeln!(out)?;
        writeln!(out, "// Typedef for a single non-pmove decoder function")?;
        writeln!(out, "typedef int (*dsp_decoder)({}& ctx);", CONTEXT_TYPE)?;

        for chain in &table.chains {
            writeln!(out)?;
            writeln!(
                out,
                "// Decode with top bits = %{:0width$b}",
                chain.index,
                width = table.top_bits as usize
            )?;
            writeln!(
                out,
                "static int {}{:0sd$x}({}& ctx)",
                CHAIN_PREFIX,
                chain.index,
                CONTEXT_TYPE,
                sd = slot_digits
            )?;
            writeln!(out, "{{")?;
            for test in &chain.tests {
                writeln!(
                    out,
                    "  if ((ctx.header & 0x{:0d$x}) == 0x{:0d$x})",
                    test.mask,
                    test.value,
                    d = digits
                )?;
                writeln!(
                    out,
                    "     return {}(ctx, Opcode::{});",
                    routine_name(&test.field_tag),
                    test.opcode
                )?;
            }
            if chain.tests.is_empty() {
                writeln!(out, "  (void)ctx;")?;
            }
            writeln!(out, "  return 1;")?;
            writeln!(out, "}}")?;
        }

        writeln!(
            out,
            "// Maps top {} bits of the instruction header to decoder table functions.",
            table.top_bits
        )?;
        writeln!(out, "static const dsp_decoder {}[{}] =", TABLE_NAME, table.chains.len())?;
        writeln!(out, "{{")?;
        let rows: Vec<String> = table
            .chains
            .iter()
            .map(|c| format!("\t{}{:0sd$x}", CHAIN_PREFIX, c.index, sd = slot_digits))
            .collect();
        writeln!(out, "{}", rows.join(",\n"))?;
        writeln!(out, "}};")?;
        writeln!(out)?;
        Ok(out)
    }

    fn render_protos(&self, unit: &CompiledUnit) -> Result<String, EmitError> {
        let mut out = String::new();

        for entry in unit.fields.entries() {
            writeln!(out, "\t// Decoder for field type '{}'", entry.signature)?;
            for &idx in &entry.users {
                let record = &unit.records[idx];
                writeln!(
                    out,
                    "\t// Used in {}  {:<10} '{}'",
                    record.pattern, record.opcode, record.meta.notes
                )?;
            }
            writeln!(
                out,
                "\tstatic int {}({}& ctx, Opcode opcode)",
                routine_name(&entry.tag),
                CONTEXT_TYPE
            )?;
            writeln!(out, "\t{{")?;
            writeln!(out, "\t\tctx.inst.opcode = opcode;")?;
            writeln!(out, "\t\treturn 0;")?;
            writeln!(out, "\t}}")?;
            writeln!(out)?;
        }
        Ok(out)
    }
}

impl Default for CppBackend {
    fn default() -> Self {
        Self::new("hop56")
    }
}

fn routine_name(tag: &FieldTag) -> String {
    format!("{}{}", ROUTINE_PREFIX, tag)
}

impl Backend for CppBackend {
    fn name(&self) -> &'static str {
        "cpp"
    }

    fn render(&self, unit: &CompiledUnit) -> Result<Vec<GeneratedFile>, EmitError> {
        Ok(vec![
            GeneratedFile::new("opcode.h", self.render_opcode_enum(unit)?),
            GeneratedFile::new("opcode_strings.i", self.render_opcode_strings(unit)?),
            GeneratedFile::new("nonp_tables.i", self.render_tables(unit)?),
            GeneratedFile::new("protos.cpp", self.render_protos(unit)?),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tablegen::{compile_description, BuildOptions};

    const DESCRIPTION: &str = "\
nop     -       -       NOPARMO %000000000000000000000000 dsp_none
div     S,D     -       NOPARMO %000000011000000001jjd000 dsp_x0y0ab jj=(x0=0, x1=2, y0=1, y1=3)
andi    #xx     D       NOPARMO %00000000iiiiiiii101110ee dsp_immcr ee=(mr=0, ccr=1, omr=2)
ori     #xx     D       NOPARMO %00000000iiiiiiii111110ee dsp_immcr ee=(mr=0, ccr=1, omr=2)
";

    fn render() -> Vec<GeneratedFile> {
        let unit = compile_description(DESCRIPTION, BuildOptions::default()).unwrap();
        CppBackend::default().render(&unit).unwrap()
    }

    fn file<'a>(files: &'a [GeneratedFile], name: &str) -> &'a str {
        &files.iter().find(|f| f.name == name).unwrap().contents
    }

    #[test]
    fn test_file_set() {
        let names: Vec<_> = render().into_iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["opcode.h", "opcode_strings.i", "nonp_tables.i", "protos.cpp"]);
    }

    #[test]
    fn test_opcode_enum() {
        let files = render();
        let header = file(&files, "opcode.h");

        assert!(header.starts_with("#ifndef HOP56_OPCODE_H\n#define HOP56_OPCODE_H\n"));
        assert!(header.contains("namespace hop56\n{\n\tenum Opcode\n\t{\n"));
        assert!(header.contains(
            "\t\tINVALID,\n\t\tO_ANDI,\n\t\tO_DIV,\n\t\tO_NOP,\n\t\tO_ORI,\n\t\tOPCODE_COUNT\n\t};\n"
        ));
        assert!(header.ends_with("#endif // HOP56_OPCODE_H\n"));
    }

    #[test]
    fn test_opcode_strings() {
        let files = render();
        let strings = file(&files, "opcode_strings.i");

        assert!(strings.contains("\tconst char* g_opcode_names[Opcode::OPCODE_COUNT] =\n"));
        assert!(strings.contains(
            "\t\t\"invalid\",\n\t\t\"andi\",\n\t\t\"div\",\n\t\t\"nop\",\n\t\t\"ori\"\n\t};\n"
        ));
        assert!(!strings.contains("opcode_count\""));
    }

    #[test]
    fn test_chain_rendering() {
        let files = render();
        let tables = file(&files, "nonp_tables.i");

        assert!(tables.starts_with("// DO NOT EDIT\n"));
        assert!(tables.contains("typedef int (*dsp_decoder)(nonp_context& ctx);\n"));

        // Slot 0 holds nop (20 fixed bits) ahead of andi/ori (10 fixed bits)
        let slot0 = "\
// Decode with top bits = %000000
static int decode_idx_00(nonp_context& ctx)
{
  if ((ctx.header & 0xfffff) == 0x00000)
     return decode_nonp_none(ctx, Opcode::O_NOP);
  if ((ctx.header & 0xf00fc) == 0x000b8)
     return decode_nonp_iiiiiiiiee(ctx, Opcode::O_ANDI);
  if ((ctx.header & 0xf00fc) == 0x000f8)
     return decode_nonp_iiiiiiiiee(ctx, Opcode::O_ORI);
  return 1;
}
";
        assert!(tables.contains(slot0), "{}", tables);

        let empty = "\
static int decode_idx_3f(nonp_context& ctx)
{
  (void)ctx;
  return 1;
}
";
        assert!(tables.contains(empty));
        assert!(tables.contains("static const dsp_decoder g_nonp_tables[64] =\n{\n\tdecode_idx_00,\n"));
        assert!(tables.contains("\tdecode_idx_3f\n};\n"));
    }

    #[test]
    fn test_protos() {
        let files = render();
        let protos = file(&files, "protos.cpp");

        assert!(protos.contains(
            "\t// Decoder for field type '____iiiiiiii______ee'\n\
             \t// Used in 0000iiiiiiii101110ee  O_ANDI     'dsp_immcr ee=(mr=0, ccr=1, omr=2)'\n\
             \t// Used in 0000iiiiiiii111110ee  O_ORI      'dsp_immcr ee=(mr=0, ccr=1, omr=2)'\n\
             \tstatic int decode_nonp_iiiiiiiiee(nonp_context& ctx, Opcode opcode)\n"
        ));
        assert_eq!(protos.matches("static int decode_nonp_").count(), 3);
        assert!(protos.contains("\t\tctx.inst.opcode = opcode;\n\t\treturn 0;\n"));
    }

    #[test]
    fn test_output_is_stable() {
        assert_eq!(render(), render());
    }

    #[test]
    fn test_custom_namespace() {
        let unit = compile_description(DESCRIPTION, BuildOptions::default()).unwrap();
        let files = CppBackend::new("dsp").render(&unit).unwrap();
        assert!(file(&files, "opcode.h").contains("#ifndef DSP_OPCODE_H"));
        assert!(file(&files, "opcode_strings.i").starts_with("namespace dsp\n"));
    }
}
