//! Builder used by front ends (and tests) to populate a [`SourceTree`].
//!
//! Expressions created while a method context is entered are recorded as
//! enclosed by that method, which is how the resolvers later find the
//! enclosing class of a query expression.

use compact_str::CompactString;

use crate::syntax::{
    tree::{
        CallExpr, ClassData, ClassId, ClassKind, DeclRef, Delegation, DelegationKind, ExprData,
        ExprId, ExprKind, FieldData, FieldId, Literal, LocalData, LocalId, MethodData, MethodId,
        MethodKind, NewExpr, ParamData, SourceTree
    },
    types::TypeDescriptor
};

#[derive(Debug, Default)]
pub struct SourceTreeBuilder {
    tree:    SourceTree,
    context: Vec<MethodId>
}

impl SourceTreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish(self) -> SourceTree {
        self.tree
    }

    fn push_expr(&mut self, kind: ExprKind, static_type: Option<TypeDescriptor>) -> ExprId {
        let id = ExprId(self.tree.exprs.len() as u32);
        self.tree.exprs.push(ExprData {
            kind,
            static_type,
            enclosing: self.context.last().copied()
        });
        id
    }

    // ---- expressions -----------------------------------------------------

    pub fn null(&mut self) -> ExprId {
        self.push_expr(ExprKind::Literal(Literal::Null), None)
    }

    pub fn boolean(&mut self, value: bool) -> ExprId {
        self.push_expr(
            ExprKind::Literal(Literal::Boolean(value)),
            Some(TypeDescriptor::Primitive(super::types::PrimitiveType::Bool))
        )
    }

    pub fn int32(&mut self, value: i32) -> ExprId {
        self.push_expr(
            ExprKind::Literal(Literal::Int32(value)),
            Some(TypeDescriptor::Primitive(
                super::types::PrimitiveType::Int32
            ))
        )
    }

    pub fn int64(&mut self, value: i64) -> ExprId {
        self.push_expr(
            ExprKind::Literal(Literal::Int64(value)),
            Some(TypeDescriptor::Primitive(
                super::types::PrimitiveType::Int64
            ))
        )
    }

    pub fn double(&mut self, value: f64) -> ExprId {
        self.push_expr(
            ExprKind::Literal(Literal::Double(value)),
            Some(TypeDescriptor::Primitive(
                super::types::PrimitiveType::Float64
            ))
        )
    }

    pub fn string(&mut self, value: &str) -> ExprId {
        self.push_expr(
            ExprKind::Literal(Literal::String(CompactString::from(value))),
            Some(TypeDescriptor::named("java.lang.String"))
        )
    }

    pub fn concat(&mut self, parts: Vec<ExprId>) -> ExprId {
        self.push_expr(
            ExprKind::StringConcat(parts),
            Some(TypeDescriptor::named("java.lang.String"))
        )
    }

    pub fn paren(&mut self, inner: ExprId) -> ExprId {
        self.push_expr(ExprKind::Parenthesized(inner), None)
    }

    pub fn list(&mut self, elements: Vec<ExprId>) -> ExprId {
        self.push_expr(ExprKind::ListLiteral(elements), None)
    }

    pub fn opaque(&mut self, static_type: Option<TypeDescriptor>) -> ExprId {
        self.push_expr(ExprKind::Opaque, static_type)
    }

    pub fn class_ref(&mut self, class: ClassId) -> ExprId {
        let name = self.tree.classes[class.0 as usize].name.clone();
        self.push_expr(
            ExprKind::ClassRef {
                class: Some(class),
                name
            },
            None
        )
    }

    pub fn call(&mut self, receiver: Option<ExprId>, method: &str, args: Vec<ExprId>) -> ExprId {
        self.push_expr(
            ExprKind::Call(CallExpr {
                receiver,
                method: CompactString::from(method),
                args,
                declaring_class: None,
                target: None
            }),
            None
        )
    }

    /// A call to a static factory method, resolved by the front end to a
    /// declaring class (`Filters.eq(..)` style).
    pub fn static_call(&mut self, declaring_class: &str, method: &str, args: Vec<ExprId>) -> ExprId {
        self.push_expr(
            ExprKind::Call(CallExpr {
                receiver: None,
                method: CompactString::from(method),
                args,
                declaring_class: Some(CompactString::from(declaring_class)),
                target: None
            }),
            None
        )
    }

    pub fn new_object(&mut self, class_name: &str, args: Vec<ExprId>) -> ExprId {
        self.push_expr(
            ExprKind::New(NewExpr {
                class:      None,
                class_name: CompactString::from(class_name),
                args
            }),
            None
        )
    }

    pub fn read_local(&mut self, local: LocalId) -> ExprId {
        let name = self.tree.locals[local.0 as usize].name.clone();
        self.push_expr(
            ExprKind::VarRef {
                name,
                decl: Some(DeclRef::Local(local))
            },
            None
        )
    }

    pub fn read_field(&mut self, field: FieldId) -> ExprId {
        let data = &self.tree.fields[field.0 as usize];
        let name = data.name.clone();
        let static_type = data.declared_type.clone();
        self.push_expr(
            ExprKind::VarRef {
                name,
                decl: Some(DeclRef::Field(field))
            },
            static_type
        )
    }

    pub fn read_param(&mut self, method: MethodId, index: usize) -> ExprId {
        let param = &self.tree.methods[method.0 as usize].params[index];
        let name = param.name.clone();
        let static_type = param.param_type.clone();
        self.push_expr(
            ExprKind::VarRef {
                name,
                decl: Some(DeclRef::Param {
                    method,
                    index
                })
            },
            static_type
        )
    }

    pub fn read_enum_constant(&mut self, class: ClassId, constant: &str) -> ExprId {
        let data = &self.tree.classes[class.0 as usize];
        let index = data
            .enum_constants
            .iter()
            .position(|name| name == constant)
            .unwrap_or(0);
        let static_type = Some(TypeDescriptor::Enum {
            name:      data.name.clone(),
            constants: data.enum_constants.clone()
        });
        self.push_expr(
            ExprKind::VarRef {
                name: CompactString::from(constant),
                decl: Some(DeclRef::EnumConstant {
                    class,
                    index
                })
            },
            static_type
        )
    }

    // ---- expression attributes -------------------------------------------

    pub fn set_type(&mut self, expr: ExprId, static_type: TypeDescriptor) {
        self.tree.exprs[expr.0 as usize].static_type = Some(static_type);
    }

    pub fn typed_call(
        &mut self,
        receiver: Option<ExprId>,
        method: &str,
        args: Vec<ExprId>,
        static_type: TypeDescriptor
    ) -> ExprId {
        let expr = self.call(receiver, method, args);
        self.set_type(expr, static_type);
        expr
    }

    pub fn set_declaring_class(&mut self, expr: ExprId, declaring_class: &str) {
        if let ExprKind::Call(call) = &mut self.tree.exprs[expr.0 as usize].kind {
            call.declaring_class = Some(CompactString::from(declaring_class));
        }
    }

    pub fn set_target(&mut self, expr: ExprId, method: MethodId) {
        if let ExprKind::Call(call) = &mut self.tree.exprs[expr.0 as usize].kind {
            call.target = Some(method);
        }
    }

    // ---- declarations ----------------------------------------------------

    pub fn class(&mut self, name: &str) -> ClassId {
        let id = ClassId(self.tree.classes.len() as u32);
        self.tree.classes.push(ClassData {
            name: CompactString::from(name),
            kind: ClassKind::Class,
            superclass: None,
            fields: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
            enum_constants: Vec::new(),
            mapped_collection: None
        });
        id
    }

    pub fn enum_class(&mut self, name: &str, constants: &[&str]) -> ClassId {
        let id = self.class(name);
        let data = &mut self.tree.classes[id.0 as usize];
        data.kind = ClassKind::Enum;
        data.enum_constants = constants.iter().map(|c| CompactString::from(*c)).collect();
        id
    }

    pub fn set_superclass(&mut self, sub: ClassId, base: ClassId) {
        self.tree.classes[sub.0 as usize].superclass = Some(base);
    }

    pub fn set_mapped_collection(&mut self, class: ClassId, collection: &str) {
        self.tree.classes[class.0 as usize].mapped_collection =
            Some(CompactString::from(collection));
    }

    pub fn local(&mut self, name: &str, initializer: Option<ExprId>) -> LocalId {
        let id = LocalId(self.tree.locals.len() as u32);
        self.tree.locals.push(LocalData {
            name: CompactString::from(name),
            initializer
        });
        id
    }

    pub fn field(
        &mut self,
        class: Option<ClassId>,
        name: &str,
        declared_type: Option<TypeDescriptor>,
        is_final: bool
    ) -> FieldId {
        let id = FieldId(self.tree.fields.len() as u32);
        self.tree.fields.push(FieldData {
            name: CompactString::from(name),
            class,
            declared_type,
            is_final,
            initializer: None,
            assignments: Vec::new()
        });
        if let Some(class) = class {
            self.tree.classes[class.0 as usize].fields.push(id);
        }
        id
    }

    pub fn set_local_initializer(&mut self, local: LocalId, initializer: ExprId) {
        self.tree.locals[local.0 as usize].initializer = Some(initializer);
    }

    pub fn set_field_initializer(&mut self, field: FieldId, initializer: ExprId) {
        self.tree.fields[field.0 as usize].initializer = Some(initializer);
    }

    pub fn add_field_assignment(&mut self, field: FieldId, value: ExprId) {
        self.tree.fields[field.0 as usize].assignments.push(value);
    }

    pub fn method(&mut self, class: Option<ClassId>, name: &str) -> MethodId {
        let id = MethodId(self.tree.methods.len() as u32);
        self.tree.methods.push(MethodData {
            name: CompactString::from(name),
            class,
            kind: MethodKind::Method,
            params: Vec::new(),
            is_private: false,
            is_static: false,
            is_overridable: false,
            returns: Vec::new(),
            field_assignments: Vec::new(),
            delegation: None
        });
        if let Some(class) = class {
            self.tree.classes[class.0 as usize].methods.push(id);
        }
        id
    }

    pub fn private_method(&mut self, class: Option<ClassId>, name: &str) -> MethodId {
        let id = self.method(class, name);
        self.tree.methods[id.0 as usize].is_private = true;
        id
    }

    pub fn mark_static(&mut self, method: MethodId) {
        self.tree.methods[method.0 as usize].is_static = true;
    }

    pub fn mark_overridable(&mut self, method: MethodId) {
        self.tree.methods[method.0 as usize].is_overridable = true;
    }

    pub fn constructor(&mut self, class: ClassId) -> MethodId {
        let id = MethodId(self.tree.methods.len() as u32);
        let name = self.tree.classes[class.0 as usize].name.clone();
        self.tree.methods.push(MethodData {
            name,
            class: Some(class),
            kind: MethodKind::Constructor,
            params: Vec::new(),
            is_private: false,
            is_static: false,
            is_overridable: false,
            returns: Vec::new(),
            field_assignments: Vec::new(),
            delegation: None
        });
        self.tree.classes[class.0 as usize].constructors.push(id);
        id
    }

    pub fn param(
        &mut self,
        method: MethodId,
        name: &str,
        param_type: Option<TypeDescriptor>
    ) -> usize {
        let params = &mut self.tree.methods[method.0 as usize].params;
        params.push(ParamData {
            name: CompactString::from(name),
            param_type
        });
        params.len() - 1
    }

    pub fn add_return(&mut self, method: MethodId, expr: ExprId) {
        self.tree.methods[method.0 as usize].returns.push(expr);
    }

    /// Records `this.<field> = <value>` inside a method or constructor
    /// body. Constructor assignments live here; other assignment sites are
    /// recorded with [`Self::add_field_assignment`] as well.
    pub fn assign_field_in(&mut self, method: MethodId, field: FieldId, value: ExprId) {
        self.tree.methods[method.0 as usize]
            .field_assignments
            .push((field, value));
    }

    pub fn delegate_this(&mut self, ctor: MethodId, target: Option<MethodId>, args: Vec<ExprId>) {
        self.tree.methods[ctor.0 as usize].delegation = Some(Delegation {
            kind: DelegationKind::This,
            target,
            args
        });
    }

    pub fn delegate_super(&mut self, ctor: MethodId, target: Option<MethodId>, args: Vec<ExprId>) {
        self.tree.methods[ctor.0 as usize].delegation = Some(Delegation {
            kind: DelegationKind::Super,
            target,
            args
        });
    }

    // ---- method context --------------------------------------------------

    pub fn enter_method(&mut self, method: MethodId) {
        self.context.push(method);
    }

    pub fn exit_method(&mut self) {
        self.context.pop();
    }
}
