//! Resolves a callee [`Value`] into something the dispatch loop knows how
//! to invoke, and checks arity before a frame is pushed.

use crate::error::{ErrorKind, RuntimeError};
use crate::obj::{Instance, ObjData};
use crate::value::Value;

pub enum CallTarget<'gc> {
    /// `bind_receiver` is set when the callee was resolved through a
    /// [`crate::obj::BoundMethod`] (an invoke through `super`, or any other
    /// bound method value) -- the call site's own calling convention
    /// leaves the callee object itself sitting in the new frame's slot 0,
    /// so dispatch must overwrite that slot with the real receiver.
    Script { chunk_index: u32, arity: u8, name: String, bind_receiver: Option<Value<'gc>>, module: Option<crate::obj::Obj<'gc>> },
    Native(crate::obj::NativeFunction<'gc>),
    Constructor { class: crate::obj::Obj<'gc> },
}

pub fn resolve_callee<'gc>(callee: &Value<'gc>, arg_count: u8) -> Result<CallTarget<'gc>, RuntimeError> {
    match callee {
        Value::Object(obj) => match &*obj.read() {
            ObjData::Function(function) => {
                check_arity(function.arity, arg_count, &function.name)?;
                Ok(CallTarget::Script {
                    chunk_index: function.chunk_index,
                    arity: function.arity,
                    name: function.name.clone(),
                    bind_receiver: None,
                    module: function.module,
                })
            }
            ObjData::Native(native) => {
                if native.arity >= 0 && native.arity as u8 != arg_count {
                    return Err(RuntimeError::new(
                        ErrorKind::TypeMismatch,
                        format!("'{}' expects {} argument(s), got {arg_count}", native.name, native.arity),
                    ));
                }
                Ok(CallTarget::Native(*native))
            }
            ObjData::Class(_) => Ok(CallTarget::Constructor { class: *obj }),
            ObjData::BoundMethod(bound) => {
                let mut target = resolve_callee(&Value::Object(bound.method), arg_count)?;
                if let CallTarget::Script { bind_receiver, .. } = &mut target {
                    *bind_receiver = Some(bound.receiver);
                }
                Ok(target)
            }
            _ => Err(RuntimeError::new(ErrorKind::TypeMismatch, format!("'{}' is not callable", obj.type_name()))),
        },
        other => Err(RuntimeError::new(ErrorKind::TypeMismatch, format!("'{}' is not callable", other.type_name()))),
    }
}

fn check_arity(arity: u8, got: u8, name: &str) -> Result<(), RuntimeError> {
    if arity != got {
        return Err(RuntimeError::new(
            ErrorKind::TypeMismatch,
            format!("'{name}' expects {arity} argument(s), got {got}"),
        ));
    }
    Ok(())
}

pub fn new_instance<'gc>(
    mc: gc_arena::MutationContext<'gc, '_>,
    class: crate::obj::Obj<'gc>,
) -> crate::obj::Obj<'gc> {
    gc_arena::Gc::allocate(
        mc,
        gc_arena::GcCell::allocate(
            mc,
            ObjData::Instance(Instance { class, fields: indexmap::IndexMap::new() }),
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_callable_value_is_a_type_error() {
        let err = resolve_callee(&Value::Integer(5), 0).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeMismatch);
    }
}
