//! Bytecode disassembly.

use std::fmt::Write as _;

use nodevm_core::{OpCode, Operand, STACK_INVALID};

use crate::bytecode::{Function, InstructionReader};

/// Render a function as one instruction per line.
///
/// ```text
/// function graph (entry 0)
///   arg x: FLOAT3 @0
///   return length: FLOAT @3
/// 0000 LENGTH_FLOAT3 @0 @3
/// 0003 END
/// ```
///
/// Stack operands print as `@index`, jump operands as `->address`, unused
/// slots and missing jump targets as `-`.
pub fn disassemble(function: &Function) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "function {} (entry {})",
        function.name(),
        function.entry()
    );
    for arg in function.arguments() {
        let _ = write!(out, "  arg {}: {} ", arg.name, arg.typedesc);
        write_slot(&mut out, arg.stack_index);
        out.push('\n');
    }
    for ret in function.returns() {
        let _ = write!(out, "  return {}: {} ", ret.name, ret.typedesc);
        write_slot(&mut out, ret.stack_index);
        out.push('\n');
    }

    let mut reader = InstructionReader::new(function.code());
    while !reader.is_at_end() {
        let address = reader.pc();
        let op = reader.read_opcode();
        let _ = write!(out, "{address:04} {}", op.name());
        for &operand in op.operands() {
            out.push(' ');
            write_operand(&mut out, &mut reader, operand);
        }
        out.push('\n');
        if op == OpCode::End && !reader.is_at_end() {
            out.push('\n');
        }
    }
    out
}

fn write_slot(out: &mut String, index: u32) {
    if index == STACK_INVALID {
        out.push('-');
    } else {
        let _ = write!(out, "@{index}");
    }
}

fn write_operand(out: &mut String, reader: &mut InstructionReader<'_>, operand: Operand) {
    let _ = match operand {
        Operand::Stack => {
            write_slot(out, reader.read_stack_index());
            Ok(())
        }
        Operand::Jump => match reader.read_jump_address() {
            STACK_INVALID => write!(out, "-"),
            address => write!(out, "->{address}"),
        },
        Operand::Float => write!(out, "{}", reader.read_float()),
        Operand::Float3 => {
            let v = reader.read_float3();
            write!(out, "({}, {}, {})", v.x, v.y, v.z)
        }
        Operand::Float4 => {
            let v = reader.read_float4();
            write!(out, "({}, {}, {}, {})", v.x, v.y, v.z, v.w)
        }
        Operand::Int => write!(out, "{}", reader.read_int()),
        Operand::Matrix44 => {
            let m = reader.read_matrix44();
            write!(out, "{:?}", m.data)
        }
        Operand::String => write!(out, "{:?}", reader.read_string()),
        Operand::Object => write!(out, "{}", reader.read_object()),
    };
}

#[cfg(test)]
mod tests {
    use nodevm_core::TypeDesc;

    use super::*;
    use crate::bytecode::{BytecodeWriter, FunctionArgument, FunctionReturn};

    #[test]
    fn listing() {
        let mut writer = BytecodeWriter::new();
        writer.write_opcode(OpCode::ValueString);
        writer.write_string("abc");
        writer.write_stack_index(1);
        writer.write_opcode(OpCode::LengthFloat3);
        writer.write_stack_index(0);
        writer.write_stack_index(3);
        writer.write_opcode(OpCode::End);
        let function = Function::new(
            "test",
            writer.into_code(),
            0,
            vec![
                FunctionArgument {
                    name: "x".to_string(),
                    typedesc: TypeDesc::Float3,
                    stack_index: 0,
                    use_count: 0,
                },
                FunctionArgument {
                    name: "y".to_string(),
                    typedesc: TypeDesc::Float,
                    stack_index: STACK_INVALID,
                    use_count: 0,
                },
            ],
            vec![FunctionReturn {
                name: "length".to_string(),
                typedesc: TypeDesc::Float,
                stack_index: 3,
            }],
        );

        let text = disassemble(&function);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            [
                "function test (entry 0)",
                "  arg x: FLOAT3 @0",
                "  arg y: FLOAT -",
                "  return length: FLOAT @3",
                "0000 VALUE_STRING \"abc\" @1",
                "0003 LENGTH_FLOAT3 @0 @3",
                "0006 END",
            ]
        );
    }

    #[test]
    fn jumps() {
        let mut writer = BytecodeWriter::new();
        writer.write_opcode(OpCode::End);
        writer.write_opcode(OpCode::MeshDisplace);
        writer.write_jump_address(STACK_INVALID);
        writer.write_stack_index(2);
        writer.write_jump_address(0);
        writer.write_stack_index(5);
        writer.write_stack_index(8);
        writer.write_stack_index(9);
        writer.write_opcode(OpCode::End);
        let function = Function::new("k", writer.into_code(), 1, Vec::new(), Vec::new());

        let text = disassemble(&function);
        assert!(text.contains("0001 MESH_DISPLACE - @2 ->0 @5 @8 @9\n"));
        // Blocks are separated by a blank line.
        assert!(text.contains("0000 END\n\n0001"));
    }
}
