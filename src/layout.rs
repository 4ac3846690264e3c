//! Loading of the OpenType layout tables (`GSUB` and `GPOS`).
//!
//! Both tables share one top-level shape: a ScriptList mapping script and
//! language tags to feature indices, a FeatureList mapping features to
//! lookups, and a LookupList holding the actual rules. Everything is read
//! eagerly into owned structures; nothing here is mutated after loading.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::rc::Rc;

use bitflags::bitflags;
use log::warn;
use tinyvec::TinyVec;

use crate::binary::read::{
    CheckIndex, ReadArray, ReadBinary, ReadBinaryDep, ReadCache, ReadCtxt, ReadFixedSizeDep,
    ReadFrom, ReadScope,
};
use crate::binary::U16Be;
use crate::context::{ContextLookupHelper, GlyphTable, LookupFlag, MatchContext};
use crate::error::ParseError;
use crate::size;

/// Marker type for the `GSUB` table.
pub enum GSUB {}
/// Marker type for the `GPOS` table.
pub enum GPOS {}

/// Sentinel meaning "no required feature" in a LangSys table.
pub const NO_REQUIRED_FEATURE: u16 = 0xFFFF;

/// Structure-sharing caches used while a table is loaded. Subtables that
/// reference the same coverage/class-definition/device offset share one
/// allocation. The cache is discarded once the table is built.
pub struct LoadCache {
    coverages: RefCell<ReadCache<Coverage>>,
    classdefs: RefCell<ReadCache<ClassDef>>,
    devices: RefCell<ReadCache<Device>>,
}

impl LoadCache {
    pub fn new() -> Self {
        LoadCache {
            coverages: RefCell::new(ReadCache::new()),
            classdefs: RefCell::new(ReadCache::new()),
            devices: RefCell::new(ReadCache::new()),
        }
    }
}

impl Default for LoadCache {
    fn default() -> Self {
        LoadCache::new()
    }
}

/// Load a `GSUB` table from the bytes of the table.
pub fn load_gsub(data: &[u8]) -> Result<LayoutTable<GSUB>, ParseError> {
    let cache = LoadCache::new();
    ReadScope::new(data).read_dep::<LayoutTable<GSUB>>(&cache)
}

/// Load a `GPOS` table from the bytes of the table.
pub fn load_gpos(data: &[u8]) -> Result<LayoutTable<GPOS>, ParseError> {
    let cache = LoadCache::new();
    ReadScope::new(data).read_dep::<LayoutTable<GPOS>>(&cache)
}

// GSUB and GPOS have the same top-level structure
pub struct LayoutTable<T: LayoutTableType> {
    pub script_list: Option<ScriptList>,
    pub feature_list: Option<FeatureList>,
    pub lookup_list: Option<LookupList<T>>,
}

pub struct ScriptList {
    script_records: Vec<ScriptRecord>,
}

pub struct ScriptRecord {
    pub script_tag: u32,
    script_table: ScriptTable,
}

pub struct ScriptTable {
    default_langsys: Option<LangSys>,
    langsys_records: Vec<LangSysRecord>,
}

pub struct LangSysRecord {
    pub langsys_tag: u32,
    langsys_table: LangSys,
}

pub struct LangSys {
    required_feature_index: u16,
    feature_indices: Vec<u16>,
}

pub struct FeatureList {
    feature_records: Vec<FeatureRecord>,
}

pub struct FeatureRecord {
    pub feature_tag: u32,
    feature_table: FeatureTable,
}

pub struct FeatureTable {
    pub lookup_indices: Vec<u16>,
}

pub struct LookupList<T: LayoutTableType> {
    lookups: Vec<LookupTable<T>>,
}

pub struct LookupTable<T: LayoutTableType> {
    pub lookup_flag: LookupFlag,
    pub subtables: T::Lookup,
}

pub enum LookupType<T: LayoutTableType> {
    Normal(T::BaseLookupType),
    Extension,
}

#[derive(Copy, Clone, PartialEq, Debug)]
pub enum SubstLookupType {
    SingleSubst,
    MultipleSubst,
    AlternateSubst,
    LigatureSubst,
    ContextSubst,
    ChainContextSubst,
    ReverseChainSingleSubst,
}

#[derive(Copy, Clone, PartialEq, Debug)]
pub enum PosLookupType {
    SinglePos,
    PairPos,
    CursivePos,
    MarkBasePos,
    MarkLigPos,
    MarkMarkPos,
    ContextPos,
    ChainContextPos,
}

pub enum SubstLookup {
    SingleSubst(Vec<SingleSubst>),
    MultipleSubst(Vec<MultipleSubst>),
    AlternateSubst(Vec<AlternateSubst>),
    LigatureSubst(Vec<LigatureSubst>),
    ContextSubst(Vec<ContextLookup<GSUB>>),
    ChainContextSubst(Vec<ChainContextLookup<GSUB>>),
    ReverseChainSingleSubst(Vec<ReverseChainSingleSubst>),
}

pub enum PosLookup {
    SinglePos(Vec<SinglePos>),
    PairPos(Vec<PairPos>),
    CursivePos(Vec<CursivePos>),
    MarkBasePos(Vec<MarkBasePos>),
    MarkLigPos(Vec<MarkLigPos>),
    MarkMarkPos(Vec<MarkBasePos>),
    ContextPos(Vec<ContextLookup<GPOS>>),
    ChainContextPos(Vec<ChainContextLookup<GPOS>>),
}

pub trait LayoutTableType: Sized + 'static {
    type Lookup;
    type BaseLookupType: Copy + PartialEq;

    fn check_lookup_type(lookup_type: u16) -> Result<LookupType<Self>, ParseError>;

    fn read_lookup_subtables<'a>(
        lookup_type: Self::BaseLookupType,
        subtables: &[ReadScope<'a>],
        cache: &'a LoadCache,
    ) -> Result<Self::Lookup, ParseError>;
}

impl LayoutTableType for GSUB {
    type Lookup = SubstLookup;
    type BaseLookupType = SubstLookupType;

    fn check_lookup_type(lookup_type: u16) -> Result<LookupType<GSUB>, ParseError> {
        match lookup_type {
            1 => Ok(LookupType::Normal(SubstLookupType::SingleSubst)),
            2 => Ok(LookupType::Normal(SubstLookupType::MultipleSubst)),
            3 => Ok(LookupType::Normal(SubstLookupType::AlternateSubst)),
            4 => Ok(LookupType::Normal(SubstLookupType::LigatureSubst)),
            5 => Ok(LookupType::Normal(SubstLookupType::ContextSubst)),
            6 => Ok(LookupType::Normal(SubstLookupType::ChainContextSubst)),
            7 => Ok(LookupType::Extension),
            8 => Ok(LookupType::Normal(SubstLookupType::ReverseChainSingleSubst)),
            _ => Err(ParseError::BadVersion),
        }
    }

    fn read_lookup_subtables<'a>(
        lookup_type: SubstLookupType,
        subtables: &[ReadScope<'a>],
        cache: &'a LoadCache,
    ) -> Result<SubstLookup, ParseError> {
        match lookup_type {
            SubstLookupType::SingleSubst => Ok(SubstLookup::SingleSubst(
                read_subtables::<SingleSubst>(subtables, cache)?,
            )),
            SubstLookupType::MultipleSubst => Ok(SubstLookup::MultipleSubst(
                read_subtables::<MultipleSubst>(subtables, cache)?,
            )),
            SubstLookupType::AlternateSubst => Ok(SubstLookup::AlternateSubst(
                read_subtables::<AlternateSubst>(subtables, cache)?,
            )),
            SubstLookupType::LigatureSubst => Ok(SubstLookup::LigatureSubst(
                read_subtables::<LigatureSubst>(subtables, cache)?,
            )),
            SubstLookupType::ContextSubst => Ok(SubstLookup::ContextSubst(read_subtables::<
                ContextLookup<GSUB>,
            >(
                subtables, cache
            )?)),
            SubstLookupType::ChainContextSubst => Ok(SubstLookup::ChainContextSubst(
                read_subtables::<ChainContextLookup<GSUB>>(subtables, cache)?,
            )),
            SubstLookupType::ReverseChainSingleSubst => Ok(SubstLookup::ReverseChainSingleSubst(
                read_subtables::<ReverseChainSingleSubst>(subtables, cache)?,
            )),
        }
    }
}

impl LayoutTableType for GPOS {
    type Lookup = PosLookup;
    type BaseLookupType = PosLookupType;

    fn check_lookup_type(lookup_type: u16) -> Result<LookupType<GPOS>, ParseError> {
        match lookup_type {
            1 => Ok(LookupType::Normal(PosLookupType::SinglePos)),
            2 => Ok(LookupType::Normal(PosLookupType::PairPos)),
            3 => Ok(LookupType::Normal(PosLookupType::CursivePos)),
            4 => Ok(LookupType::Normal(PosLookupType::MarkBasePos)),
            5 => Ok(LookupType::Normal(PosLookupType::MarkLigPos)),
            6 => Ok(LookupType::Normal(PosLookupType::MarkMarkPos)),
            7 => Ok(LookupType::Normal(PosLookupType::ContextPos)),
            8 => Ok(LookupType::Normal(PosLookupType::ChainContextPos)),
            9 => Ok(LookupType::Extension),
            _ => Err(ParseError::BadVersion),
        }
    }

    fn read_lookup_subtables<'a>(
        lookup_type: PosLookupType,
        subtables: &[ReadScope<'a>],
        cache: &'a LoadCache,
    ) -> Result<PosLookup, ParseError> {
        match lookup_type {
            PosLookupType::SinglePos => Ok(PosLookup::SinglePos(read_subtables::<SinglePos>(
                subtables, cache,
            )?)),
            PosLookupType::PairPos => Ok(PosLookup::PairPos(read_subtables::<PairPos>(
                subtables, cache,
            )?)),
            PosLookupType::CursivePos => Ok(PosLookup::CursivePos(read_subtables::<CursivePos>(
                subtables, cache,
            )?)),
            PosLookupType::MarkBasePos => Ok(PosLookup::MarkBasePos(
                read_subtables::<MarkBasePos>(subtables, cache)?,
            )),
            PosLookupType::MarkLigPos => Ok(PosLookup::MarkLigPos(read_subtables::<MarkLigPos>(
                subtables, cache,
            )?)),
            PosLookupType::MarkMarkPos => Ok(PosLookup::MarkMarkPos(
                read_subtables::<MarkBasePos>(subtables, cache)?,
            )),
            PosLookupType::ContextPos => Ok(PosLookup::ContextPos(read_subtables::<
                ContextLookup<GPOS>,
            >(
                subtables, cache
            )?)),
            PosLookupType::ChainContextPos => Ok(PosLookup::ChainContextPos(read_subtables::<
                ChainContextLookup<GPOS>,
            >(
                subtables, cache
            )?)),
        }
    }
}

fn read_subtables<'a, S: ReadBinaryDep<Args<'a> = &'a LoadCache, HostType<'a> = S>>(
    scopes: &[ReadScope<'a>],
    cache: &'a LoadCache,
) -> Result<Vec<S>, ParseError> {
    let mut subtables = Vec::with_capacity(scopes.len());
    for scope in scopes {
        subtables.push(scope.read_dep::<S>(cache)?);
    }
    Ok(subtables)
}

impl<T: LayoutTableType> ReadBinaryDep for LayoutTable<T> {
    type Args<'a> = &'a LoadCache;
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, cache: Self::Args<'a>) -> Result<Self, ParseError> {
        let table = ctxt.scope();

        let major_version = ctxt.read_u16be()?;
        let _minor_version = ctxt.read_u16be()?;
        let script_list_offset = usize::from(ctxt.read_u16be()?);
        let feature_list_offset = usize::from(ctxt.read_u16be()?);
        let lookup_list_offset = usize::from(ctxt.read_u16be()?);

        // We handle versions 1.x
        ctxt.check_version(major_version == 1)?;

        let script_list = if script_list_offset >= table.data().len() {
            return Err(ParseError::BadOffset);
        } else if script_list_offset == 0 {
            None
        } else {
            Some(table.offset(script_list_offset).read::<ScriptList>()?)
        };

        let feature_list = if feature_list_offset >= table.data().len() {
            return Err(ParseError::BadOffset);
        } else if feature_list_offset == 0 {
            None
        } else {
            Some(table.offset(feature_list_offset).read::<FeatureList>()?)
        };

        let lookup_list = if lookup_list_offset >= table.data().len() {
            return Err(ParseError::BadOffset);
        } else if lookup_list_offset == 0 {
            None
        } else {
            Some(
                table
                    .offset(lookup_list_offset)
                    .read_dep::<LookupList<T>>(cache)?,
            )
        };

        Ok(LayoutTable {
            script_list,
            feature_list,
            lookup_list,
        })
    }
}

impl ReadBinary for ScriptList {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let script_count = usize::from(ctxt.read_u16be()?);
        let script_records = ctxt
            .read_array_dep::<ScriptRecord>(script_count, scope)?
            .read_to_vec()?;
        Ok(ScriptList { script_records })
    }
}

impl ReadBinaryDep for ScriptRecord {
    type Args<'a> = ReadScope<'a>;
    type HostType<'a> = ScriptRecord;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, scope: Self::Args<'a>) -> Result<Self, ParseError> {
        let script_tag = ctxt.read_u32be()?;
        let script_offset = ctxt.read_u16be()?;
        let script_table = scope
            .offset(usize::from(script_offset))
            .read::<ScriptTable>()?;
        Ok(ScriptRecord {
            script_tag,
            script_table,
        })
    }
}

impl ReadFixedSizeDep for ScriptRecord {
    fn size(_scope: Self::Args<'_>) -> usize {
        size::U32 + size::U16
    }
}

impl ReadBinary for ScriptTable {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let default_langsys_offset = usize::from(ctxt.read_u16be()?);
        let default_langsys = if default_langsys_offset != 0 {
            Some(scope.offset(default_langsys_offset).read::<LangSys>()?)
        } else {
            None
        };
        let langsys_count = usize::from(ctxt.read_u16be()?);
        let langsys_records = ctxt
            .read_array_dep::<LangSysRecord>(langsys_count, scope)?
            .read_to_vec()?;
        Ok(ScriptTable {
            default_langsys,
            langsys_records,
        })
    }
}

impl ReadBinaryDep for LangSysRecord {
    type Args<'a> = ReadScope<'a>;
    type HostType<'a> = LangSysRecord;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, scope: Self::Args<'a>) -> Result<Self, ParseError> {
        let langsys_tag = ctxt.read_u32be()?;
        let langsys_offset = ctxt.read_u16be()?;
        let langsys_table = scope.offset(usize::from(langsys_offset)).read::<LangSys>()?;
        Ok(LangSysRecord {
            langsys_tag,
            langsys_table,
        })
    }
}

impl ReadFixedSizeDep for LangSysRecord {
    fn size(_scope: Self::Args<'_>) -> usize {
        size::U32 + size::U16
    }
}

impl ReadBinary for LangSys {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let _lookup_order = usize::from(ctxt.read_u16be()?); // reserved
        let required_feature_index = ctxt.read_u16be()?;
        let feature_index_count = usize::from(ctxt.read_u16be()?);
        let feature_indices = ctxt.read_array::<U16Be>(feature_index_count)?.to_vec();
        Ok(LangSys {
            required_feature_index,
            feature_indices,
        })
    }
}

impl LangSys {
    /// Index of this language system's required feature, if any.
    pub fn required_feature_index(&self) -> Option<u16> {
        if self.required_feature_index == NO_REQUIRED_FEATURE {
            None
        } else {
            Some(self.required_feature_index)
        }
    }

    pub fn feature_indices(&self) -> &[u16] {
        &self.feature_indices
    }
}

impl ReadBinary for FeatureList {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let feature_count = usize::from(ctxt.read_u16be()?);
        let feature_records = ctxt
            .read_array_dep::<FeatureRecord>(feature_count, scope)?
            .read_to_vec()?;
        Ok(FeatureList { feature_records })
    }
}

impl FeatureList {
    pub fn len(&self) -> usize {
        self.feature_records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feature_records.is_empty()
    }

    pub fn nth_feature_record(&self, index: usize) -> Result<&FeatureRecord, ParseError> {
        self.feature_records.check_index(index)?;
        Ok(&self.feature_records[index])
    }
}

impl FeatureRecord {
    pub fn feature_table(&self) -> &FeatureTable {
        &self.feature_table
    }
}

impl ReadBinaryDep for FeatureRecord {
    type Args<'a> = ReadScope<'a>;
    type HostType<'a> = FeatureRecord;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, scope: Self::Args<'a>) -> Result<Self, ParseError> {
        let feature_tag = ctxt.read_u32be()?;
        let feature_offset = ctxt.read_u16be()?;
        let feature_table = scope
            .offset(usize::from(feature_offset))
            .read::<FeatureTable>()?;
        Ok(FeatureRecord {
            feature_tag,
            feature_table,
        })
    }
}

impl ReadFixedSizeDep for FeatureRecord {
    fn size(_scope: Self::Args<'_>) -> usize {
        size::U32 + size::U16
    }
}

impl ReadBinary for FeatureTable {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let _feature_params = usize::from(ctxt.read_u16be()?); // reserved
        let lookup_index_count = usize::from(ctxt.read_u16be()?);
        let lookup_indices = ctxt.read_array::<U16Be>(lookup_index_count)?.to_vec();
        Ok(FeatureTable { lookup_indices })
    }
}

impl<T: LayoutTableType> ReadBinaryDep for LookupList<T> {
    type Args<'a> = &'a LoadCache;
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, cache: Self::Args<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let lookup_count = usize::from(ctxt.read_u16be()?);
        let lookup_offsets = ctxt.read_array::<U16Be>(lookup_count)?;
        let mut lookups = Vec::with_capacity(lookup_count);
        for lookup_offset in &lookup_offsets {
            let lookup = scope
                .offset(usize::from(lookup_offset))
                .read_dep::<LookupTable<T>>(cache)?;
            lookups.push(lookup);
        }
        Ok(LookupList { lookups })
    }
}

impl<T: LayoutTableType> LookupList<T> {
    pub fn len(&self) -> usize {
        self.lookups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lookups.is_empty()
    }

    pub fn lookup(&self, lookup_index: usize) -> Option<&LookupTable<T>> {
        self.lookups.get(lookup_index)
    }
}

impl<T: LayoutTableType> ReadBinaryDep for LookupTable<T> {
    type Args<'a> = &'a LoadCache;
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, cache: Self::Args<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let lookup_type = T::check_lookup_type(ctxt.read_u16be()?)?;
        let lookup_flag = LookupFlag::from_bits_retain(ctxt.read_u16be()?);
        let subtable_count = usize::from(ctxt.read_u16be()?);
        let subtable_offsets = ctxt.read_array::<U16Be>(subtable_count)?;

        let mut subtable_scopes = Vec::with_capacity(subtable_count);
        for subtable_offset in &subtable_offsets {
            subtable_scopes.push(scope.offset(usize::from(subtable_offset)));
        }

        // Extension lookups wrap every subtable in a redirection header;
        // resolve them now so the engine never sees the indirection.
        let base_lookup_type = match lookup_type {
            LookupType::Normal(base) => base,
            LookupType::Extension => {
                let mut resolved_type = None;
                for subtable_scope in subtable_scopes.iter_mut() {
                    let ext = subtable_scope.read::<ExtensionHeader<T>>()?;
                    match resolved_type {
                        None => resolved_type = Some(ext.extension_lookup_type),
                        // All subtables of a lookup must share one type
                        Some(t) if t != ext.extension_lookup_type => {
                            return Err(ParseError::BadValue)
                        }
                        Some(_) => {}
                    }
                    *subtable_scope = subtable_scope.offset(ext.extension_offset as usize);
                }
                resolved_type.ok_or(ParseError::MissingValue)?
            }
        };

        let subtables = T::read_lookup_subtables(base_lookup_type, &subtable_scopes, cache)?;
        Ok(LookupTable {
            lookup_flag,
            subtables,
        })
    }
}

struct ExtensionHeader<T: LayoutTableType> {
    extension_lookup_type: T::BaseLookupType,
    extension_offset: u32,
}

impl<T: LayoutTableType> ReadBinary for ExtensionHeader<T> {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        match ctxt.read_u16be()? {
            1 => {
                let extension_lookup_type = match T::check_lookup_type(ctxt.read_u16be()?)? {
                    LookupType::Normal(lookup_type) => lookup_type,
                    // An extension must not point at another extension
                    LookupType::Extension => return Err(ParseError::BadVersion),
                };
                let extension_offset = ctxt.read_u32be()?;
                Ok(ExtensionHeader {
                    extension_lookup_type,
                    extension_offset,
                })
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl<T: LayoutTableType> LayoutTable<T> {
    fn scripts(&self) -> &[ScriptRecord] {
        self.script_list
            .as_ref()
            .map(|list| list.script_records.as_slice())
            .unwrap_or(&[])
    }

    /// Resolve a script tag to its index in the script list.
    pub fn select_script(&self, script_tag: u32) -> Option<u16> {
        self.scripts()
            .iter()
            .position(|record| record.script_tag == script_tag)
            .map(|index| index as u16)
    }

    /// Resolve a language tag within a script. On success also yields the
    /// language system's required feature index (if it names one).
    pub fn select_language(
        &self,
        script_index: u16,
        language_tag: u32,
    ) -> Result<Option<(u16, Option<u16>)>, ParseError> {
        let script = self.script_by_index(script_index)?;
        Ok(script
            .langsys_records
            .iter()
            .position(|record| record.langsys_tag == language_tag)
            .map(|index| {
                let langsys = &script.langsys_records[index].langsys_table;
                (index as u16, langsys.required_feature_index())
            }))
    }

    /// Resolve a feature tag within a (script, language) pair.
    /// `language_index` of `None` selects the default language system.
    pub fn select_feature(
        &self,
        script_index: u16,
        language_index: Option<u16>,
        feature_tag: u32,
    ) -> Result<Option<u16>, ParseError> {
        let langsys = match self.langsys(script_index, language_index)? {
            Some(langsys) => langsys,
            None => return Ok(None),
        };
        let feature_list = match self.feature_list {
            Some(ref feature_list) => feature_list,
            None => return Ok(None),
        };
        for &feature_index in &langsys.feature_indices {
            let record = feature_list.nth_feature_record(usize::from(feature_index))?;
            if record.feature_tag == feature_tag {
                return Ok(Some(feature_index));
            }
        }
        Ok(None)
    }

    /// Tags of every script in the table, in table order.
    pub fn script_tags(&self) -> Vec<u32> {
        self.scripts()
            .iter()
            .map(|record| record.script_tag)
            .collect()
    }

    /// Tags of every language system of a script, in table order. The
    /// default language system is not tagged and so not listed.
    pub fn language_tags(&self, script_index: u16) -> Result<Vec<u32>, ParseError> {
        let script = self.script_by_index(script_index)?;
        Ok(script
            .langsys_records
            .iter()
            .map(|record| record.langsys_tag)
            .collect())
    }

    /// Tags of every feature of a (script, language) pair, in the order the
    /// language system references them.
    pub fn feature_tags(
        &self,
        script_index: u16,
        language_index: Option<u16>,
    ) -> Result<Vec<u32>, ParseError> {
        let langsys = match self.langsys(script_index, language_index)? {
            Some(langsys) => langsys,
            None => return Ok(Vec::new()),
        };
        let feature_list = self.feature_list.as_ref().ok_or(ParseError::MissingValue)?;
        let mut tags = Vec::with_capacity(langsys.feature_indices.len());
        for &feature_index in &langsys.feature_indices {
            let record = feature_list.nth_feature_record(usize::from(feature_index))?;
            tags.push(record.feature_tag);
        }
        Ok(tags)
    }

    fn script_by_index(&self, script_index: u16) -> Result<&ScriptTable, ParseError> {
        let scripts = self.scripts();
        scripts
            .get(usize::from(script_index))
            .map(|record| &record.script_table)
            .ok_or(ParseError::BadIndex)
    }

    /// The language system selected by `language_index`, or the default one.
    pub fn langsys(
        &self,
        script_index: u16,
        language_index: Option<u16>,
    ) -> Result<Option<&LangSys>, ParseError> {
        let script = self.script_by_index(script_index)?;
        match language_index {
            Some(language_index) => script
                .langsys_records
                .get(usize::from(language_index))
                .map(|record| Some(&record.langsys_table))
                .ok_or(ParseError::BadIndex),
            None => Ok(script.default_langsys.as_ref()),
        }
    }

    pub fn feature_by_index(&self, feature_index: u16) -> Result<&FeatureRecord, ParseError> {
        match self.feature_list {
            Some(ref feature_list) => feature_list.nth_feature_record(usize::from(feature_index)),
            None => Err(ParseError::BadIndex),
        }
    }

    pub fn lookup_count(&self) -> usize {
        self.lookup_list
            .as_ref()
            .map(|list| list.len())
            .unwrap_or(0)
    }
}

impl ScriptTable {
    pub fn default_langsys(&self) -> Option<&LangSys> {
        self.default_langsys.as_ref()
    }

    pub fn langsys_records(&self) -> &[LangSysRecord] {
        &self.langsys_records
    }
}

/// Per-shaping-session feature activation state.
///
/// The original stored this inside the loaded table; keeping it separate
/// lets one loaded table serve concurrent shaping sessions. Each added
/// feature ORs its property mask onto every lookup it references; at
/// shaping time a lookup applies to a glyph when at least one of its mask
/// bits is absent from the glyph's own property word.
pub struct FeaturePlan {
    apply_order: TinyVec<[u16; 16]>,
    lookup_properties: Vec<u32>,
}

impl FeaturePlan {
    pub fn new() -> Self {
        FeaturePlan {
            apply_order: TinyVec::new(),
            lookup_properties: Vec::new(),
        }
    }

    /// Mark every lookup of `feature_index` with `property_mask` and queue
    /// the feature for application. Each feature can only be added once.
    pub fn add_feature<T: LayoutTableType>(
        &mut self,
        table: &LayoutTable<T>,
        feature_index: u16,
        property_mask: u32,
    ) -> Result<(), ParseError> {
        if self.apply_order.contains(&feature_index) {
            return Err(ParseError::BadValue);
        }
        let feature = table.feature_by_index(feature_index)?;
        let lookup_count = table.lookup_count();
        if self.lookup_properties.len() < lookup_count {
            self.lookup_properties.resize(lookup_count, 0);
        }
        self.apply_order.push(feature_index);
        for &lookup_index in &feature.feature_table().lookup_indices {
            // Nonexistent lookups are skipped, not an error
            if let Some(properties) = self.lookup_properties.get_mut(usize::from(lookup_index)) {
                *properties |= property_mask;
            }
        }
        Ok(())
    }

    /// Forget every added feature and reset all lookup masks.
    pub fn clear_features(&mut self) {
        self.apply_order.clear();
        self.lookup_properties.clear();
    }

    pub fn apply_order(&self) -> &[u16] {
        &self.apply_order
    }

    pub fn lookup_properties(&self, lookup_index: usize) -> u32 {
        self.lookup_properties
            .get(lookup_index)
            .copied()
            .unwrap_or(0)
    }
}

impl Default for FeaturePlan {
    fn default() -> Self {
        FeaturePlan::new()
    }
}

/// GSUB LookupType 1: replace one glyph with another.
pub enum SingleSubst {
    Format1 {
        coverage: Rc<Coverage>,
        delta_glyph_id: i16,
    },
    Format2 {
        coverage: Rc<Coverage>,
        substitutes: Vec<u16>,
    },
}

impl ReadBinaryDep for SingleSubst {
    type Args<'a> = &'a LoadCache;
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, cache: Self::Args<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let coverage_offset = usize::from(ctxt.read_u16be()?);
                let coverage = scope
                    .offset(coverage_offset)
                    .read_cache::<Coverage>(&mut cache.coverages.borrow_mut())?;
                let delta_glyph_id = ctxt.read_i16be()?;
                Ok(SingleSubst::Format1 {
                    coverage,
                    delta_glyph_id,
                })
            }
            2 => {
                let coverage_offset = usize::from(ctxt.read_u16be()?);
                let coverage = scope
                    .offset(coverage_offset)
                    .read_cache::<Coverage>(&mut cache.coverages.borrow_mut())?;
                let glyph_count = usize::from(ctxt.read_u16be()?);
                let substitutes = ctxt.read_array::<U16Be>(glyph_count)?.to_vec();
                Ok(SingleSubst::Format2 {
                    coverage,
                    substitutes,
                })
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl SingleSubst {
    pub fn apply_glyph(&self, glyph: u16) -> Result<Option<u16>, ParseError> {
        match *self {
            SingleSubst::Format1 {
                ref coverage,
                delta_glyph_id,
            } => match coverage.glyph_coverage_value(glyph) {
                // Addition of the delta is modulo 65536
                Some(_index) => Ok(Some(
                    ((i32::from(glyph) + i32::from(delta_glyph_id)) & 0xFFFF) as u16,
                )),
                None => Ok(None),
            },
            SingleSubst::Format2 {
                ref coverage,
                ref substitutes,
            } => match coverage.glyph_coverage_value(glyph) {
                Some(index) => {
                    let index = usize::from(index);
                    substitutes.check_index(index)?;
                    Ok(Some(substitutes[index]))
                }
                None => Ok(None),
            },
        }
    }
}

/// GSUB LookupType 2: replace one glyph with a sequence.
pub struct MultipleSubst {
    coverage: Rc<Coverage>,
    sequences: Vec<SequenceTable>,
}

pub struct SequenceTable {
    pub substitute_glyphs: Vec<u16>,
}

impl ReadBinaryDep for MultipleSubst {
    type Args<'a> = &'a LoadCache;
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, cache: Self::Args<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let coverage_offset = usize::from(ctxt.read_u16be()?);
                let coverage = scope
                    .offset(coverage_offset)
                    .read_cache::<Coverage>(&mut cache.coverages.borrow_mut())?;
                let sequence_count = usize::from(ctxt.read_u16be()?);
                let sequence_offsets = ctxt.read_array::<U16Be>(sequence_count)?;
                let sequences = read_objects::<SequenceTable>(&scope, sequence_offsets)?;
                Ok(MultipleSubst {
                    coverage,
                    sequences,
                })
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl ReadBinary for SequenceTable {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let glyph_count = usize::from(ctxt.read_u16be()?);
        // A zero-length sequence deletes the glyph. The OpenType spec
        // forbids it but fonts rely on it.
        let substitute_glyphs = ctxt.read_array::<U16Be>(glyph_count)?.to_vec();
        Ok(SequenceTable { substitute_glyphs })
    }
}

impl MultipleSubst {
    pub fn apply_glyph(&self, glyph: u16) -> Result<Option<&SequenceTable>, ParseError> {
        match self.coverage.glyph_coverage_value(glyph) {
            Some(index) => {
                let index = usize::from(index);
                self.sequences.check_index(index)?;
                Ok(Some(&self.sequences[index]))
            }
            None => Ok(None),
        }
    }
}

/// GSUB LookupType 3: replace a glyph with one of a set of alternates.
pub struct AlternateSubst {
    coverage: Rc<Coverage>,
    alternate_sets: Vec<AlternateSet>,
}

pub struct AlternateSet {
    pub alternate_glyphs: Vec<u16>,
}

impl ReadBinaryDep for AlternateSubst {
    type Args<'a> = &'a LoadCache;
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, cache: Self::Args<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let coverage_offset = usize::from(ctxt.read_u16be()?);
                let coverage = scope
                    .offset(coverage_offset)
                    .read_cache::<Coverage>(&mut cache.coverages.borrow_mut())?;
                let alternate_set_count = usize::from(ctxt.read_u16be()?);
                let alternate_set_offsets = ctxt.read_array::<U16Be>(alternate_set_count)?;
                let alternate_sets = read_objects::<AlternateSet>(&scope, alternate_set_offsets)?;
                Ok(AlternateSubst {
                    coverage,
                    alternate_sets,
                })
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl ReadBinary for AlternateSet {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let glyph_count = usize::from(ctxt.read_u16be()?);
        ctxt.check(glyph_count > 0)?;
        let alternate_glyphs = ctxt.read_array::<U16Be>(glyph_count)?.to_vec();
        Ok(AlternateSet { alternate_glyphs })
    }
}

impl AlternateSubst {
    pub fn apply_glyph(&self, glyph: u16) -> Result<Option<&AlternateSet>, ParseError> {
        match self.coverage.glyph_coverage_value(glyph) {
            Some(index) => {
                let index = usize::from(index);
                self.alternate_sets.check_index(index)?;
                Ok(Some(&self.alternate_sets[index]))
            }
            None => Ok(None),
        }
    }
}

/// GSUB LookupType 4: replace a run of glyphs with a ligature glyph.
pub struct LigatureSubst {
    coverage: Rc<Coverage>,
    ligature_sets: Vec<LigatureSet>,
}

pub struct LigatureSet {
    pub ligatures: Vec<Ligature>,
}

pub struct Ligature {
    pub ligature_glyph: u16,
    /// Components after the first; the first is the coverage glyph.
    pub component_glyphs: Vec<u16>,
}

impl ReadBinaryDep for LigatureSubst {
    type Args<'a> = &'a LoadCache;
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, cache: Self::Args<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let coverage_offset = usize::from(ctxt.read_u16be()?);
                let coverage = scope
                    .offset(coverage_offset)
                    .read_cache::<Coverage>(&mut cache.coverages.borrow_mut())?;
                let ligature_set_count = usize::from(ctxt.read_u16be()?);
                let ligature_set_offsets = ctxt.read_array::<U16Be>(ligature_set_count)?;
                let ligature_sets = read_objects::<LigatureSet>(&scope, ligature_set_offsets)?;
                Ok(LigatureSubst {
                    coverage,
                    ligature_sets,
                })
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl ReadBinary for LigatureSet {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let ligature_count = usize::from(ctxt.read_u16be()?);
        let ligature_offsets = ctxt.read_array::<U16Be>(ligature_count)?;
        let ligatures = read_objects::<Ligature>(&scope, ligature_offsets)?;
        Ok(LigatureSet { ligatures })
    }
}

impl ReadBinary for Ligature {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let ligature_glyph = ctxt.read_u16be()?;
        let component_count = usize::from(ctxt.read_u16be()?);
        ctxt.check(component_count > 0)?;
        let component_glyphs = ctxt.read_array::<U16Be>(component_count - 1)?.to_vec();
        Ok(Ligature {
            ligature_glyph,
            component_glyphs,
        })
    }
}

impl LigatureSubst {
    pub fn ligature_set_for_glyph(&self, glyph: u16) -> Result<Option<&LigatureSet>, ParseError> {
        match self.coverage.glyph_coverage_value(glyph) {
            Some(index) => {
                let index = usize::from(index);
                self.ligature_sets.check_index(index)?;
                Ok(Some(&self.ligature_sets[index]))
            }
            None => Ok(None),
        }
    }
}

bitflags! {
    /// Which fields are present in a GPOS value record.
    #[derive(Copy, Clone, PartialEq, Eq, Debug)]
    pub struct ValueFormat: u16 {
        const X_PLACEMENT = 0x0001;
        const Y_PLACEMENT = 0x0002;
        const X_ADVANCE = 0x0004;
        const Y_ADVANCE = 0x0008;
        const X_PLACEMENT_DEVICE = 0x0010;
        const Y_PLACEMENT_DEVICE = 0x0020;
        const X_ADVANCE_DEVICE = 0x0040;
        const Y_ADVANCE_DEVICE = 0x0080;
        // Metric-id fields for the multiple-master hook
        const X_ID_PLACEMENT = 0x0100;
        const Y_ID_PLACEMENT = 0x0200;
        const X_ID_ADVANCE = 0x0400;
        const Y_ID_ADVANCE = 0x0800;
    }
}

impl ValueFormat {
    /// Size in bytes of a value record with this format.
    pub fn record_size(self) -> usize {
        usize::from(self.bits().count_ones() as u16) * size::U16
    }
}

impl ReadBinary for ValueFormat {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        ValueFormat::from_bits(ctxt.read_u16be()?).ok_or(ParseError::BadValue)
    }
}

/// A positioning adjustment: signed placement/advance deltas in design
/// units, optional per-ppem device corrections, and optional
/// multiple-master metric ids.
#[derive(Clone, Default)]
pub struct ValueRecord {
    pub x_placement: i16,
    pub y_placement: i16,
    pub x_advance: i16,
    pub y_advance: i16,
    pub x_placement_device: Option<Rc<Device>>,
    pub y_placement_device: Option<Rc<Device>>,
    pub x_advance_device: Option<Rc<Device>>,
    pub y_advance_device: Option<Rc<Device>>,
    pub x_placement_id: Option<u16>,
    pub y_placement_id: Option<u16>,
    pub x_advance_id: Option<u16>,
    pub y_advance_id: Option<u16>,
}

impl ValueRecord {
    pub fn is_empty(&self) -> bool {
        self.x_placement == 0
            && self.y_placement == 0
            && self.x_advance == 0
            && self.y_advance == 0
            && self.x_placement_device.is_none()
            && self.y_placement_device.is_none()
            && self.x_advance_device.is_none()
            && self.y_advance_device.is_none()
            && self.x_placement_id.is_none()
            && self.y_placement_id.is_none()
            && self.x_advance_id.is_none()
            && self.y_advance_id.is_none()
    }
}

impl ReadBinaryDep for ValueRecord {
    // (format, scope device offsets are relative to, load cache)
    type Args<'a> = (ValueFormat, ReadScope<'a>, &'a LoadCache);
    type HostType<'a> = Self;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        (format, scope, cache): Self::Args<'a>,
    ) -> Result<Self, ParseError> {
        let mut record = ValueRecord::default();
        if format.contains(ValueFormat::X_PLACEMENT) {
            record.x_placement = ctxt.read_i16be()?;
        }
        if format.contains(ValueFormat::Y_PLACEMENT) {
            record.y_placement = ctxt.read_i16be()?;
        }
        if format.contains(ValueFormat::X_ADVANCE) {
            record.x_advance = ctxt.read_i16be()?;
        }
        if format.contains(ValueFormat::Y_ADVANCE) {
            record.y_advance = ctxt.read_i16be()?;
        }
        if format.contains(ValueFormat::X_PLACEMENT_DEVICE) {
            record.x_placement_device = read_device(ctxt.read_u16be()?, &scope, cache)?;
        }
        if format.contains(ValueFormat::Y_PLACEMENT_DEVICE) {
            record.y_placement_device = read_device(ctxt.read_u16be()?, &scope, cache)?;
        }
        if format.contains(ValueFormat::X_ADVANCE_DEVICE) {
            record.x_advance_device = read_device(ctxt.read_u16be()?, &scope, cache)?;
        }
        if format.contains(ValueFormat::Y_ADVANCE_DEVICE) {
            record.y_advance_device = read_device(ctxt.read_u16be()?, &scope, cache)?;
        }
        if format.contains(ValueFormat::X_ID_PLACEMENT) {
            record.x_placement_id = Some(ctxt.read_u16be()?);
        }
        if format.contains(ValueFormat::Y_ID_PLACEMENT) {
            record.y_placement_id = Some(ctxt.read_u16be()?);
        }
        if format.contains(ValueFormat::X_ID_ADVANCE) {
            record.x_advance_id = Some(ctxt.read_u16be()?);
        }
        if format.contains(ValueFormat::Y_ID_ADVANCE) {
            record.y_advance_id = Some(ctxt.read_u16be()?);
        }
        Ok(record)
    }
}

impl ReadFixedSizeDep for ValueRecord {
    fn size((format, _scope, _cache): Self::Args<'_>) -> usize {
        format.record_size()
    }
}

fn read_device(
    offset: u16,
    scope: &ReadScope<'_>,
    cache: &LoadCache,
) -> Result<Option<Rc<Device>>, ParseError> {
    if offset == 0 {
        return Ok(None);
    }
    scope
        .offset(usize::from(offset))
        .read_cache::<Device>(&mut cache.devices.borrow_mut())
        .map(Some)
}

/// Per-ppem hinting corrections, packed 2, 4 or 8 bits per size.
pub struct Device {
    start_size: u16,
    end_size: u16,
    delta_format: u16,
    delta_values: Vec<u16>,
}

impl ReadBinary for Device {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let start_size = ctxt.read_u16be()?;
        let end_size = ctxt.read_u16be()?;
        let delta_format = ctxt.read_u16be()?;
        ctxt.check(start_size <= end_size)?;
        let bits = match delta_format {
            1 => 2,
            2 => 4,
            3 => 8,
            _ => return Err(ParseError::BadVersion),
        };
        let entry_count = usize::from(end_size - start_size) + 1;
        let word_count = (entry_count * bits + 15) / 16;
        let delta_values = ctxt.read_array::<U16Be>(word_count)?.to_vec();
        Ok(Device {
            start_size,
            end_size,
            delta_format,
            delta_values,
        })
    }
}

impl Device {
    /// The signed per-pixel adjustment for `ppem`, 0 outside the device's
    /// size range.
    pub fn adjustment(&self, ppem: u16) -> i16 {
        if ppem < self.start_size || ppem > self.end_size {
            return 0;
        }
        let bits = 1u16 << self.delta_format; // 2, 4 or 8
        let per_word = 16 / bits;
        let index = ppem - self.start_size;
        let word = match self.delta_values.get(usize::from(index / per_word)) {
            Some(&word) => word,
            None => return 0,
        };
        let shift = 16 - bits * (index % per_word + 1);
        let raw = (word >> shift) & ((1 << bits) - 1);
        // sign extend
        if raw >= 1 << (bits - 1) {
            raw as i16 - (1 << bits)
        } else {
            raw as i16
        }
    }
}

/// An attachment point on a glyph.
pub enum Anchor {
    Format1 {
        x: i16,
        y: i16,
    },
    /// Design coordinates refined by a glyph contour point.
    Format2 {
        x: i16,
        y: i16,
        anchor_point: u16,
    },
    /// Design coordinates refined by device tables.
    Format3 {
        x: i16,
        y: i16,
        x_device: Option<Rc<Device>>,
        y_device: Option<Rc<Device>>,
    },
    /// Multiple-master metric ids, resolved through the metric callback.
    Format4 {
        x_id: u16,
        y_id: u16,
    },
}

impl ReadBinaryDep for Anchor {
    type Args<'a> = &'a LoadCache;
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, cache: Self::Args<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let x = ctxt.read_i16be()?;
                let y = ctxt.read_i16be()?;
                Ok(Anchor::Format1 { x, y })
            }
            2 => {
                let x = ctxt.read_i16be()?;
                let y = ctxt.read_i16be()?;
                let anchor_point = ctxt.read_u16be()?;
                Ok(Anchor::Format2 { x, y, anchor_point })
            }
            3 => {
                let x = ctxt.read_i16be()?;
                let y = ctxt.read_i16be()?;
                let x_device = read_device(ctxt.read_u16be()?, &scope, cache)?;
                let y_device = read_device(ctxt.read_u16be()?, &scope, cache)?;
                Ok(Anchor::Format3 {
                    x,
                    y,
                    x_device,
                    y_device,
                })
            }
            4 => {
                let x_id = ctxt.read_u16be()?;
                let y_id = ctxt.read_u16be()?;
                Ok(Anchor::Format4 { x_id, y_id })
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

fn read_anchor(
    offset: u16,
    scope: &ReadScope<'_>,
    cache: &LoadCache,
) -> Result<Option<Anchor>, ParseError> {
    if offset == 0 {
        // Fonts in circulation carry zero anchor offsets where an anchor
        // is required; treat them as absent
        return Ok(None);
    }
    scope
        .offset(usize::from(offset))
        .read_dep::<Anchor>(cache)
        .map(Some)
}

/// GPOS LookupType 1: position one glyph.
pub enum SinglePos {
    Format1 {
        coverage: Rc<Coverage>,
        value_record: ValueRecord,
    },
    Format2 {
        coverage: Rc<Coverage>,
        value_records: Vec<ValueRecord>,
    },
}

impl ReadBinaryDep for SinglePos {
    type Args<'a> = &'a LoadCache;
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, cache: Self::Args<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let coverage_offset = usize::from(ctxt.read_u16be()?);
                let coverage = scope
                    .offset(coverage_offset)
                    .read_cache::<Coverage>(&mut cache.coverages.borrow_mut())?;
                let value_format = ctxt.read::<ValueFormat>()?;
                let value_record = ctxt.read_dep::<ValueRecord>((value_format, scope, cache))?;
                Ok(SinglePos::Format1 {
                    coverage,
                    value_record,
                })
            }
            2 => {
                let coverage_offset = usize::from(ctxt.read_u16be()?);
                let coverage = scope
                    .offset(coverage_offset)
                    .read_cache::<Coverage>(&mut cache.coverages.borrow_mut())?;
                let value_format = ctxt.read::<ValueFormat>()?;
                let value_count = usize::from(ctxt.read_u16be()?);
                let value_records = ctxt
                    .read_array_dep::<ValueRecord>(value_count, (value_format, scope, cache))?
                    .read_to_vec()?;
                Ok(SinglePos::Format2 {
                    coverage,
                    value_records,
                })
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl SinglePos {
    pub fn apply(&self, glyph: u16) -> Result<Option<&ValueRecord>, ParseError> {
        match *self {
            SinglePos::Format1 {
                ref coverage,
                ref value_record,
            } => match coverage.glyph_coverage_value(glyph) {
                Some(_index) => Ok(Some(value_record)),
                None => Ok(None),
            },
            SinglePos::Format2 {
                ref coverage,
                ref value_records,
            } => match coverage.glyph_coverage_value(glyph) {
                Some(index) => {
                    let index = usize::from(index);
                    value_records.check_index(index)?;
                    Ok(Some(&value_records[index]))
                }
                None => Ok(None),
            },
        }
    }
}

/// GPOS LookupType 2: position a pair of glyphs.
pub enum PairPos {
    Format1 {
        coverage: Rc<Coverage>,
        value_format1: ValueFormat,
        value_format2: ValueFormat,
        pair_sets: Vec<PairSet>,
    },
    Format2 {
        coverage: Rc<Coverage>,
        value_format1: ValueFormat,
        value_format2: ValueFormat,
        classdef1: Rc<ClassDef>,
        classdef2: Rc<ClassDef>,
        class2_count: usize,
        class1_records: Vec<Class1Record>,
    },
}

pub struct PairSet {
    pair_value_records: Vec<PairValueRecord>,
}

pub struct PairValueRecord {
    second_glyph: u16,
    value_record1: ValueRecord,
    value_record2: ValueRecord,
}

pub struct Class1Record {
    class2_records: Vec<Class2Record>,
}

pub struct Class2Record {
    value_record1: ValueRecord,
    value_record2: ValueRecord,
}

impl ReadBinaryDep for PairPos {
    type Args<'a> = &'a LoadCache;
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, cache: Self::Args<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let coverage_offset = usize::from(ctxt.read_u16be()?);
                let coverage = scope
                    .offset(coverage_offset)
                    .read_cache::<Coverage>(&mut cache.coverages.borrow_mut())?;
                let value_format1 = ctxt.read::<ValueFormat>()?;
                let value_format2 = ctxt.read::<ValueFormat>()?;
                let pair_set_count = usize::from(ctxt.read_u16be()?);
                let pair_set_offsets = ctxt.read_array::<U16Be>(pair_set_count)?;
                let mut pair_sets = Vec::with_capacity(pair_set_count);
                for pair_set_offset in &pair_set_offsets {
                    // Device offsets inside the records are relative to
                    // this subtable, not the pair set
                    let pair_set = scope
                        .offset(usize::from(pair_set_offset))
                        .read_dep::<PairSet>((value_format1, value_format2, scope, cache))?;
                    pair_sets.push(pair_set);
                }
                Ok(PairPos::Format1 {
                    coverage,
                    value_format1,
                    value_format2,
                    pair_sets,
                })
            }
            2 => {
                let coverage_offset = usize::from(ctxt.read_u16be()?);
                let coverage = scope
                    .offset(coverage_offset)
                    .read_cache::<Coverage>(&mut cache.coverages.borrow_mut())?;
                let value_format1 = ctxt.read::<ValueFormat>()?;
                let value_format2 = ctxt.read::<ValueFormat>()?;
                let classdef1_offset = usize::from(ctxt.read_u16be()?);
                let classdef2_offset = usize::from(ctxt.read_u16be()?);
                let classdef1 = scope
                    .offset(classdef1_offset)
                    .read_cache::<ClassDef>(&mut cache.classdefs.borrow_mut())?;
                let classdef2 = scope
                    .offset(classdef2_offset)
                    .read_cache::<ClassDef>(&mut cache.classdefs.borrow_mut())?;
                let class1_count = usize::from(ctxt.read_u16be()?);
                let class2_count = usize::from(ctxt.read_u16be()?);
                let class1_records = ctxt
                    .read_array_dep::<Class1Record>(
                        class1_count,
                        (class2_count, value_format1, value_format2, scope, cache),
                    )?
                    .read_to_vec()?;
                Ok(PairPos::Format2 {
                    coverage,
                    value_format1,
                    value_format2,
                    classdef1,
                    classdef2,
                    class2_count,
                    class1_records,
                })
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl ReadBinaryDep for PairSet {
    type Args<'a> = (ValueFormat, ValueFormat, ReadScope<'a>, &'a LoadCache);
    type HostType<'a> = Self;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        (value_format1, value_format2, subtable, cache): Self::Args<'a>,
    ) -> Result<Self, ParseError> {
        let pair_value_count = usize::from(ctxt.read_u16be()?);
        let pair_value_records = ctxt
            .read_array_dep::<PairValueRecord>(
                pair_value_count,
                (value_format1, value_format2, subtable, cache),
            )?
            .read_to_vec()?;
        Ok(PairSet { pair_value_records })
    }
}

impl ReadBinaryDep for PairValueRecord {
    type Args<'a> = (ValueFormat, ValueFormat, ReadScope<'a>, &'a LoadCache);
    type HostType<'a> = Self;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        (value_format1, value_format2, scope, cache): Self::Args<'a>,
    ) -> Result<Self, ParseError> {
        let second_glyph = ctxt.read_u16be()?;
        let value_record1 = ctxt.read_dep::<ValueRecord>((value_format1, scope, cache))?;
        let value_record2 = ctxt.read_dep::<ValueRecord>((value_format2, scope, cache))?;
        Ok(PairValueRecord {
            second_glyph,
            value_record1,
            value_record2,
        })
    }
}

impl ReadFixedSizeDep for PairValueRecord {
    fn size((value_format1, value_format2, _, _): Self::Args<'_>) -> usize {
        size::U16 + value_format1.record_size() + value_format2.record_size()
    }
}

impl ReadBinaryDep for Class1Record {
    type Args<'a> = (usize, ValueFormat, ValueFormat, ReadScope<'a>, &'a LoadCache);
    type HostType<'a> = Self;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        (class2_count, value_format1, value_format2, scope, cache): Self::Args<'a>,
    ) -> Result<Self, ParseError> {
        let mut class2_records = Vec::with_capacity(class2_count);
        for _ in 0..class2_count {
            let value_record1 = ctxt.read_dep::<ValueRecord>((value_format1, scope, cache))?;
            let value_record2 = ctxt.read_dep::<ValueRecord>((value_format2, scope, cache))?;
            class2_records.push(Class2Record {
                value_record1,
                value_record2,
            });
        }
        Ok(Class1Record { class2_records })
    }
}

impl ReadFixedSizeDep for Class1Record {
    fn size((class2_count, value_format1, value_format2, _, _): Self::Args<'_>) -> usize {
        class2_count * (value_format1.record_size() + value_format2.record_size())
    }
}

impl PairPos {
    /// Is `glyph` covered as the first glyph of a pair?
    pub fn covers_first(&self, glyph: u16) -> bool {
        match *self {
            PairPos::Format1 { ref coverage, .. } | PairPos::Format2 { ref coverage, .. } => {
                coverage.glyph_coverage_value(glyph).is_some()
            }
        }
    }

    /// Presence of a second value record decides whether the second glyph
    /// of a matched pair is consumed.
    pub fn has_second_record(&self) -> bool {
        match *self {
            PairPos::Format1 { value_format2, .. } | PairPos::Format2 { value_format2, .. } => {
                !value_format2.is_empty()
            }
        }
    }

    pub fn apply(
        &self,
        glyph1: u16,
        glyph2: u16,
    ) -> Result<Option<(&ValueRecord, &ValueRecord)>, ParseError> {
        match *self {
            PairPos::Format1 {
                ref coverage,
                ref pair_sets,
                ..
            } => match coverage.glyph_coverage_value(glyph1) {
                Some(index) => {
                    let index = usize::from(index);
                    pair_sets.check_index(index)?;
                    for record in &pair_sets[index].pair_value_records {
                        if record.second_glyph == glyph2 {
                            return Ok(Some((&record.value_record1, &record.value_record2)));
                        }
                    }
                    Ok(None)
                }
                None => Ok(None),
            },
            PairPos::Format2 {
                ref coverage,
                ref classdef1,
                ref classdef2,
                class2_count,
                ref class1_records,
                ..
            } => match coverage.glyph_coverage_value(glyph1) {
                Some(_index) => {
                    let class1 = usize::from(classdef1.glyph_class_value(glyph1));
                    let class2 = usize::from(classdef2.glyph_class_value(glyph2));
                    if class1 < class1_records.len() && class2 < class2_count {
                        let record = &class1_records[class1].class2_records[class2];
                        Ok(Some((&record.value_record1, &record.value_record2)))
                    } else {
                        Err(ParseError::BadIndex)
                    }
                }
                None => Ok(None),
            },
        }
    }
}

/// GPOS LookupType 3: cursive attachment.
pub struct CursivePos {
    coverage: Rc<Coverage>,
    entry_exit_records: Vec<EntryExitRecord>,
}

pub struct EntryExitRecord {
    pub entry_anchor: Option<Anchor>,
    pub exit_anchor: Option<Anchor>,
}

impl ReadBinaryDep for CursivePos {
    type Args<'a> = &'a LoadCache;
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, cache: Self::Args<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let coverage_offset = usize::from(ctxt.read_u16be()?);
                let coverage = scope
                    .offset(coverage_offset)
                    .read_cache::<Coverage>(&mut cache.coverages.borrow_mut())?;
                let entry_exit_count = usize::from(ctxt.read_u16be()?);
                let mut entry_exit_records = Vec::with_capacity(entry_exit_count);
                for _ in 0..entry_exit_count {
                    let entry_anchor_offset = ctxt.read_u16be()?;
                    let exit_anchor_offset = ctxt.read_u16be()?;
                    entry_exit_records.push(EntryExitRecord {
                        entry_anchor: read_anchor(entry_anchor_offset, &scope, cache)?,
                        exit_anchor: read_anchor(exit_anchor_offset, &scope, cache)?,
                    });
                }
                Ok(CursivePos {
                    coverage,
                    entry_exit_records,
                })
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl CursivePos {
    pub fn entry_exit(&self, glyph: u16) -> Result<Option<&EntryExitRecord>, ParseError> {
        match self.coverage.glyph_coverage_value(glyph) {
            Some(index) => {
                let index = usize::from(index);
                self.entry_exit_records.check_index(index)?;
                Ok(Some(&self.entry_exit_records[index]))
            }
            None => Ok(None),
        }
    }
}

/// GPOS LookupType 4 (mark-to-base) and 6 (mark-to-mark; the "base" is
/// then the earlier mark).
pub struct MarkBasePos {
    mark_coverage: Rc<Coverage>,
    base_coverage: Rc<Coverage>,
    mark_class_count: usize,
    mark_array: MarkArray,
    base_array: Vec<BaseRecord>,
}

pub struct MarkArray {
    mark_records: Vec<MarkRecord>,
}

pub struct MarkRecord {
    pub mark_class: u16,
    pub mark_anchor: Option<Anchor>,
}

pub struct BaseRecord {
    base_anchors: Vec<Option<Anchor>>,
}

impl ReadBinaryDep for MarkArray {
    type Args<'a> = &'a LoadCache;
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, cache: Self::Args<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let mark_count = usize::from(ctxt.read_u16be()?);
        let mut mark_records = Vec::with_capacity(mark_count);
        for _ in 0..mark_count {
            let mark_class = ctxt.read_u16be()?;
            let mark_anchor_offset = ctxt.read_u16be()?;
            mark_records.push(MarkRecord {
                mark_class,
                mark_anchor: read_anchor(mark_anchor_offset, &scope, cache)?,
            });
        }
        Ok(MarkArray { mark_records })
    }
}

impl MarkArray {
    fn mark_record(&self, mark_index: usize) -> Result<&MarkRecord, ParseError> {
        self.mark_records.check_index(mark_index)?;
        Ok(&self.mark_records[mark_index])
    }
}

fn read_base_array(
    scope: ReadScope<'_>,
    mark_class_count: usize,
    cache: &LoadCache,
) -> Result<Vec<BaseRecord>, ParseError> {
    let mut ctxt = scope.ctxt();
    let base_count = usize::from(ctxt.read_u16be()?);
    let mut base_records = Vec::with_capacity(base_count);
    for _ in 0..base_count {
        let mut base_anchors = Vec::with_capacity(mark_class_count);
        for _ in 0..mark_class_count {
            let anchor_offset = ctxt.read_u16be()?;
            base_anchors.push(read_anchor(anchor_offset, &scope, cache)?);
        }
        base_records.push(BaseRecord { base_anchors });
    }
    Ok(base_records)
}

impl ReadBinaryDep for MarkBasePos {
    type Args<'a> = &'a LoadCache;
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, cache: Self::Args<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let mark_coverage_offset = usize::from(ctxt.read_u16be()?);
                let base_coverage_offset = usize::from(ctxt.read_u16be()?);
                let mark_class_count = usize::from(ctxt.read_u16be()?);
                let mark_array_offset = usize::from(ctxt.read_u16be()?);
                let base_array_offset = usize::from(ctxt.read_u16be()?);
                let mark_coverage = scope
                    .offset(mark_coverage_offset)
                    .read_cache::<Coverage>(&mut cache.coverages.borrow_mut())?;
                let base_coverage = scope
                    .offset(base_coverage_offset)
                    .read_cache::<Coverage>(&mut cache.coverages.borrow_mut())?;
                let mark_array = scope
                    .offset(mark_array_offset)
                    .read_dep::<MarkArray>(cache)?;
                let base_array =
                    read_base_array(scope.offset(base_array_offset), mark_class_count, cache)?;
                Ok(MarkBasePos {
                    mark_coverage,
                    base_coverage,
                    mark_class_count,
                    mark_array,
                    base_array,
                })
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl MarkBasePos {
    /// Anchors attaching `mark_glyph` to `base_glyph`: `(base, mark)`.
    pub fn attachment(
        &self,
        base_glyph: u16,
        mark_glyph: u16,
    ) -> Result<Option<(&Anchor, &Anchor)>, ParseError> {
        let mark_index = match self.mark_coverage.glyph_coverage_value(mark_glyph) {
            Some(index) => usize::from(index),
            None => return Ok(None),
        };
        let base_index = match self.base_coverage.glyph_coverage_value(base_glyph) {
            Some(index) => usize::from(index),
            None => return Ok(None),
        };
        let mark_record = self.mark_array.mark_record(mark_index)?;
        let mark_class = usize::from(mark_record.mark_class);
        if mark_class >= self.mark_class_count {
            return Err(ParseError::BadIndex);
        }
        self.base_array.check_index(base_index)?;
        let base_anchor = &self.base_array[base_index].base_anchors[mark_class];
        match (base_anchor, &mark_record.mark_anchor) {
            (Some(base_anchor), Some(mark_anchor)) => Ok(Some((base_anchor, mark_anchor))),
            _ => Ok(None),
        }
    }
}

/// GPOS LookupType 5: mark-to-ligature attachment.
pub struct MarkLigPos {
    mark_coverage: Rc<Coverage>,
    ligature_coverage: Rc<Coverage>,
    mark_class_count: usize,
    mark_array: MarkArray,
    ligature_array: Vec<LigatureAttach>,
}

pub struct LigatureAttach {
    component_records: Vec<BaseRecord>,
}

impl ReadBinaryDep for MarkLigPos {
    type Args<'a> = &'a LoadCache;
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, cache: Self::Args<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let mark_coverage_offset = usize::from(ctxt.read_u16be()?);
                let ligature_coverage_offset = usize::from(ctxt.read_u16be()?);
                let mark_class_count = usize::from(ctxt.read_u16be()?);
                let mark_array_offset = usize::from(ctxt.read_u16be()?);
                let ligature_array_offset = usize::from(ctxt.read_u16be()?);
                let mark_coverage = scope
                    .offset(mark_coverage_offset)
                    .read_cache::<Coverage>(&mut cache.coverages.borrow_mut())?;
                let ligature_coverage = scope
                    .offset(ligature_coverage_offset)
                    .read_cache::<Coverage>(&mut cache.coverages.borrow_mut())?;
                let mark_array = scope
                    .offset(mark_array_offset)
                    .read_dep::<MarkArray>(cache)?;

                let ligature_array_scope = scope.offset(ligature_array_offset);
                let mut array_ctxt = ligature_array_scope.ctxt();
                let ligature_count = usize::from(array_ctxt.read_u16be()?);
                let attach_offsets = array_ctxt.read_array::<U16Be>(ligature_count)?;
                let mut ligature_array = Vec::with_capacity(ligature_count);
                for attach_offset in &attach_offsets {
                    let attach_scope = ligature_array_scope.offset(usize::from(attach_offset));
                    let component_records =
                        read_base_array(attach_scope, mark_class_count, cache)?;
                    ligature_array.push(LigatureAttach { component_records });
                }

                Ok(MarkLigPos {
                    mark_coverage,
                    ligature_coverage,
                    mark_class_count,
                    mark_array,
                    ligature_array,
                })
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl MarkLigPos {
    /// Anchors attaching `mark_glyph` to component `component` of
    /// `ligature_glyph`. When the mark does not belong to the ligature
    /// (`same_ligature` false) it attaches to the last component.
    pub fn attachment(
        &self,
        ligature_glyph: u16,
        mark_glyph: u16,
        same_ligature: bool,
        component: u16,
    ) -> Result<Option<(&Anchor, &Anchor)>, ParseError> {
        let mark_index = match self.mark_coverage.glyph_coverage_value(mark_glyph) {
            Some(index) => usize::from(index),
            None => return Ok(None),
        };
        let ligature_index = match self.ligature_coverage.glyph_coverage_value(ligature_glyph) {
            Some(index) => usize::from(index),
            None => return Ok(None),
        };
        let mark_record = self.mark_array.mark_record(mark_index)?;
        let mark_class = usize::from(mark_record.mark_class);
        if mark_class >= self.mark_class_count {
            return Err(ParseError::BadIndex);
        }
        self.ligature_array.check_index(ligature_index)?;
        let attach = &self.ligature_array[ligature_index].component_records;
        if attach.is_empty() {
            return Ok(None);
        }
        let component_index = if same_ligature {
            let component_index = usize::from(component);
            if component_index >= attach.len() {
                return Ok(None);
            }
            component_index
        } else {
            attach.len() - 1
        };
        let ligature_anchor = &attach[component_index].base_anchors[mark_class];
        match (ligature_anchor, &mark_record.mark_anchor) {
            (Some(ligature_anchor), Some(mark_anchor)) => Ok(Some((ligature_anchor, mark_anchor))),
            _ => Ok(None),
        }
    }
}

/// GSUB LookupTypes 5 and 7 (GPOS): contextual rules.
pub enum ContextLookup<T: LayoutTableType + 'static> {
    Format1 {
        coverage: Rc<Coverage>,
        subrulesets: Vec<Option<SubRuleSet>>,
        phantom: PhantomData<T>,
    },
    Format2 {
        coverage: Rc<Coverage>,
        classdef: Rc<ClassDef>,
        subclasssets: Vec<Option<SubClassSet>>,
        phantom: PhantomData<T>,
    },
    Format3 {
        coverages: Vec<Rc<Coverage>>,
        lookup_records: Vec<(u16, u16)>,
        phantom: PhantomData<T>,
    },
}

pub struct SubRuleSet {
    subrules: Vec<SubRule>,
}

pub struct SubRule {
    input_sequence: Vec<u16>,
    lookup_records: Vec<(u16, u16)>,
}

pub struct SubClassSet {
    subclassrules: Vec<SubClassRule>,
}

pub struct SubClassRule {
    input_sequence: Vec<u16>,
    lookup_records: Vec<(u16, u16)>,
}

/// GSUB LookupType 6 and GPOS LookupType 8: chaining contextual rules.
pub enum ChainContextLookup<T: LayoutTableType + 'static> {
    Format1 {
        coverage: Rc<Coverage>,
        chainsubrulesets: Vec<Option<ChainSubRuleSet>>,
        phantom: PhantomData<T>,
    },
    Format2 {
        coverage: Rc<Coverage>,
        backtrack_classdef: Rc<ClassDef>,
        input_classdef: Rc<ClassDef>,
        lookahead_classdef: Rc<ClassDef>,
        chainsubclasssets: Vec<Option<ChainSubClassSet>>,
        phantom: PhantomData<T>,
    },
    Format3 {
        backtrack_coverages: Vec<Rc<Coverage>>,
        input_coverages: Vec<Rc<Coverage>>,
        lookahead_coverages: Vec<Rc<Coverage>>,
        lookup_records: Vec<(u16, u16)>,
        phantom: PhantomData<T>,
    },
}

pub struct ChainSubRuleSet {
    chainsubrules: Vec<ChainSubRule>,
}

pub struct ChainSubRule {
    backtrack_sequence: Vec<u16>,
    input_sequence: Vec<u16>,
    lookahead_sequence: Vec<u16>,
    lookup_records: Vec<(u16, u16)>,
}

pub struct ChainSubClassSet {
    chainsubclassrules: Vec<ChainSubClassRule>,
}

pub struct ChainSubClassRule {
    backtrack_sequence: Vec<u16>,
    input_sequence: Vec<u16>,
    lookahead_sequence: Vec<u16>,
    lookup_records: Vec<(u16, u16)>,
}

impl<T: LayoutTableType> ReadBinaryDep for ContextLookup<T> {
    type Args<'a> = &'a LoadCache;
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, cache: Self::Args<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let coverage_offset = usize::from(ctxt.read_u16be()?);
                let subruleset_count = usize::from(ctxt.read_u16be()?);
                let subruleset_offsets = ctxt.read_array::<U16Be>(subruleset_count)?;
                let subrulesets = read_objects_nullable::<SubRuleSet>(&scope, subruleset_offsets)?;
                let coverage = scope
                    .offset(coverage_offset)
                    .read_cache::<Coverage>(&mut cache.coverages.borrow_mut())?;
                Ok(ContextLookup::Format1 {
                    coverage,
                    subrulesets,
                    phantom: PhantomData,
                })
            }
            2 => {
                let coverage_offset = usize::from(ctxt.read_u16be()?);
                let classdef_offset = usize::from(ctxt.read_u16be()?);
                let subclassset_count = usize::from(ctxt.read_u16be()?);
                let subclassset_offsets = ctxt.read_array::<U16Be>(subclassset_count)?;
                let subclasssets =
                    read_objects_nullable::<SubClassSet>(&scope, subclassset_offsets)?;
                let coverage = scope
                    .offset(coverage_offset)
                    .read_cache::<Coverage>(&mut cache.coverages.borrow_mut())?;
                let classdef = scope
                    .offset(classdef_offset)
                    .read_cache::<ClassDef>(&mut cache.classdefs.borrow_mut())?;
                Ok(ContextLookup::Format2 {
                    coverage,
                    classdef,
                    subclasssets,
                    phantom: PhantomData,
                })
            }
            3 => {
                let glyph_count = usize::from(ctxt.read_u16be()?);
                ctxt.check(glyph_count > 0)?;
                let lookup_count = usize::from(ctxt.read_u16be()?);
                let coverage_offsets = ctxt.read_array::<U16Be>(glyph_count)?;
                let lookup_records = ctxt.read_array::<(U16Be, U16Be)>(lookup_count)?.to_vec();
                let coverages = read_coverages(&scope, cache, coverage_offsets)?;
                Ok(ContextLookup::Format3 {
                    coverages,
                    lookup_records,
                    phantom: PhantomData,
                })
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl ReadBinary for SubRuleSet {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let subrule_count = usize::from(ctxt.read_u16be()?);
        let subrule_offsets = ctxt.read_array::<U16Be>(subrule_count)?;
        let subrules = read_objects::<SubRule>(&scope, subrule_offsets)?;
        Ok(SubRuleSet { subrules })
    }
}

impl ReadBinary for SubRule {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let glyph_count = usize::from(ctxt.read_u16be()?);
        ctxt.check(glyph_count > 0)?;
        let lookup_count = usize::from(ctxt.read_u16be()?);
        let input_sequence = ctxt.read_array::<U16Be>(glyph_count - 1)?.to_vec();
        let lookup_records = ctxt.read_array::<(U16Be, U16Be)>(lookup_count)?.to_vec();
        Ok(SubRule {
            input_sequence,
            lookup_records,
        })
    }
}

impl ReadBinary for SubClassSet {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let subclassrule_count = usize::from(ctxt.read_u16be()?);
        let subclassrule_offsets = ctxt.read_array::<U16Be>(subclassrule_count)?;
        let subclassrules = read_objects::<SubClassRule>(&scope, subclassrule_offsets)?;
        Ok(SubClassSet { subclassrules })
    }
}

impl ReadBinary for SubClassRule {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let glyph_count = usize::from(ctxt.read_u16be()?);
        ctxt.check(glyph_count > 0)?;
        let lookup_count = usize::from(ctxt.read_u16be()?);
        let input_sequence = ctxt.read_array::<U16Be>(glyph_count - 1)?.to_vec();
        let lookup_records = ctxt.read_array::<(U16Be, U16Be)>(lookup_count)?.to_vec();
        Ok(SubClassRule {
            input_sequence,
            lookup_records,
        })
    }
}

impl<T: LayoutTableType> ReadBinaryDep for ChainContextLookup<T> {
    type Args<'a> = &'a LoadCache;
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, cache: Self::Args<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let coverage_offset = usize::from(ctxt.read_u16be()?);
                let chainsubruleset_count = usize::from(ctxt.read_u16be()?);
                let chainsubruleset_offsets = ctxt.read_array::<U16Be>(chainsubruleset_count)?;
                let chainsubrulesets =
                    read_objects_nullable::<ChainSubRuleSet>(&scope, chainsubruleset_offsets)?;
                let coverage = scope
                    .offset(coverage_offset)
                    .read_cache::<Coverage>(&mut cache.coverages.borrow_mut())?;
                Ok(ChainContextLookup::Format1 {
                    coverage,
                    chainsubrulesets,
                    phantom: PhantomData,
                })
            }
            2 => {
                let coverage_offset = usize::from(ctxt.read_u16be()?);
                let backtrack_classdef_offset = usize::from(ctxt.read_u16be()?);
                let input_classdef_offset = usize::from(ctxt.read_u16be()?);
                let lookahead_classdef_offset = usize::from(ctxt.read_u16be()?);
                let chainsubclassset_count = usize::from(ctxt.read_u16be()?);
                let chainsubclassset_offsets = ctxt.read_array::<U16Be>(chainsubclassset_count)?;
                let chainsubclasssets =
                    read_objects_nullable::<ChainSubClassSet>(&scope, chainsubclassset_offsets)?;
                let coverage = scope
                    .offset(coverage_offset)
                    .read_cache::<Coverage>(&mut cache.coverages.borrow_mut())?;
                let backtrack_classdef = scope
                    .offset(backtrack_classdef_offset)
                    .read_cache::<ClassDef>(&mut cache.classdefs.borrow_mut())?;
                let input_classdef = scope
                    .offset(input_classdef_offset)
                    .read_cache::<ClassDef>(&mut cache.classdefs.borrow_mut())?;
                let lookahead_classdef = scope
                    .offset(lookahead_classdef_offset)
                    .read_cache::<ClassDef>(&mut cache.classdefs.borrow_mut())?;
                Ok(ChainContextLookup::Format2 {
                    coverage,
                    backtrack_classdef,
                    input_classdef,
                    lookahead_classdef,
                    chainsubclasssets,
                    phantom: PhantomData,
                })
            }
            3 => {
                let backtrack_count = usize::from(ctxt.read_u16be()?);
                let backtrack_coverage_offsets = ctxt.read_array::<U16Be>(backtrack_count)?;
                let input_count = usize::from(ctxt.read_u16be()?);
                ctxt.check(input_count > 0)?;
                let input_coverage_offsets = ctxt.read_array::<U16Be>(input_count)?;
                let lookahead_count = usize::from(ctxt.read_u16be()?);
                let lookahead_coverage_offsets = ctxt.read_array::<U16Be>(lookahead_count)?;
                let lookup_count = usize::from(ctxt.read_u16be()?);
                let lookup_records = ctxt.read_array::<(U16Be, U16Be)>(lookup_count)?.to_vec();
                let backtrack_coverages = read_coverages(&scope, cache, backtrack_coverage_offsets)?;
                let input_coverages = read_coverages(&scope, cache, input_coverage_offsets)?;
                let lookahead_coverages = read_coverages(&scope, cache, lookahead_coverage_offsets)?;
                Ok(ChainContextLookup::Format3 {
                    backtrack_coverages,
                    input_coverages,
                    lookahead_coverages,
                    lookup_records,
                    phantom: PhantomData,
                })
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl ReadBinary for ChainSubRuleSet {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let chainsubrule_count = usize::from(ctxt.read_u16be()?);
        let chainsubrule_offsets = ctxt.read_array::<U16Be>(chainsubrule_count)?;
        let chainsubrules = read_objects::<ChainSubRule>(&scope, chainsubrule_offsets)?;
        Ok(ChainSubRuleSet { chainsubrules })
    }
}

impl ReadBinary for ChainSubRule {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let backtrack_count = usize::from(ctxt.read_u16be()?);
        let backtrack_sequence = ctxt.read_array::<U16Be>(backtrack_count)?.to_vec();
        let input_count = usize::from(ctxt.read_u16be()?);
        ctxt.check(input_count > 0)?;
        let input_sequence = ctxt.read_array::<U16Be>(input_count - 1)?.to_vec();
        let lookahead_count = usize::from(ctxt.read_u16be()?);
        let lookahead_sequence = ctxt.read_array::<U16Be>(lookahead_count)?.to_vec();
        let lookup_count = usize::from(ctxt.read_u16be()?);
        let lookup_records = ctxt.read_array::<(U16Be, U16Be)>(lookup_count)?.to_vec();
        Ok(ChainSubRule {
            backtrack_sequence,
            input_sequence,
            lookahead_sequence,
            lookup_records,
        })
    }
}

impl ReadBinary for ChainSubClassSet {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let chainsubclassrule_count = usize::from(ctxt.read_u16be()?);
        let chainsubclassrule_offsets = ctxt.read_array::<U16Be>(chainsubclassrule_count)?;
        let chainsubclassrules =
            read_objects::<ChainSubClassRule>(&scope, chainsubclassrule_offsets)?;
        Ok(ChainSubClassSet { chainsubclassrules })
    }
}

impl ReadBinary for ChainSubClassRule {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let backtrack_count = usize::from(ctxt.read_u16be()?);
        let backtrack_sequence = ctxt.read_array::<U16Be>(backtrack_count)?.to_vec();
        let input_count = usize::from(ctxt.read_u16be()?);
        ctxt.check(input_count > 0)?;
        let input_sequence = ctxt.read_array::<U16Be>(input_count - 1)?.to_vec();
        let lookahead_count = usize::from(ctxt.read_u16be()?);
        let lookahead_sequence = ctxt.read_array::<U16Be>(lookahead_count)?.to_vec();
        let lookup_count = usize::from(ctxt.read_u16be()?);
        let lookup_records = ctxt.read_array::<(U16Be, U16Be)>(lookup_count)?.to_vec();
        Ok(ChainSubClassRule {
            backtrack_sequence,
            input_sequence,
            lookahead_sequence,
            lookup_records,
        })
    }
}

/// GSUB LookupType 8: reverse chaining single substitution.
pub enum ReverseChainSingleSubst {
    Format1 {
        coverage: Rc<Coverage>,
        backtrack_coverages: Vec<Rc<Coverage>>,
        lookahead_coverages: Vec<Rc<Coverage>>,
        substitute_glyphs: Vec<u16>,
    },
}

impl ReadBinaryDep for ReverseChainSingleSubst {
    type Args<'a> = &'a LoadCache;
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, cache: Self::Args<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let coverage_offset = usize::from(ctxt.read_u16be()?);
                let backtrack_count = usize::from(ctxt.read_u16be()?);
                let backtrack_coverage_offsets = ctxt.read_array::<U16Be>(backtrack_count)?;
                let lookahead_count = usize::from(ctxt.read_u16be()?);
                let lookahead_coverage_offsets = ctxt.read_array::<U16Be>(lookahead_count)?;
                let glyph_count = usize::from(ctxt.read_u16be()?);
                let substitute_glyphs = ctxt.read_array::<U16Be>(glyph_count)?.to_vec();
                let coverage = scope
                    .offset(coverage_offset)
                    .read_cache::<Coverage>(&mut cache.coverages.borrow_mut())?;
                let backtrack_coverages = read_coverages(&scope, cache, backtrack_coverage_offsets)?;
                let lookahead_coverages = read_coverages(&scope, cache, lookahead_coverage_offsets)?;
                Ok(ReverseChainSingleSubst::Format1 {
                    coverage,
                    backtrack_coverages,
                    lookahead_coverages,
                    substitute_glyphs,
                })
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

/// Try each rule of `context_lookup` whose coverage admits `glyph`,
/// accepting the first whose windows satisfy `matches`.
pub fn context_lookup_info<'a, T, Table: LayoutTableType>(
    context_lookup: &'a ContextLookup<Table>,
    glyph: u16,
    matches: impl Fn(&MatchContext<'a>) -> bool,
) -> Result<Option<Box<ContextLookupHelper<'a, T>>>, ParseError> {
    match context_lookup {
        ContextLookup::Format1 {
            coverage,
            subrulesets,
            phantom: _,
        } => match coverage.glyph_coverage_value(glyph) {
            Some(index) => {
                let index = usize::from(index);
                subrulesets.check_index(index)?;
                if let Some(ref subruleset) = subrulesets[index] {
                    for subrule in &subruleset.subrules {
                        let match_context = MatchContext {
                            backtrack_table: GlyphTable::ById(&[]),
                            input_table: GlyphTable::ById(&subrule.input_sequence),
                            lookahead_table: GlyphTable::ById(&[]),
                        };
                        if matches(&match_context) {
                            let helper =
                                ContextLookupHelper::new(match_context, &subrule.lookup_records);
                            return Ok(Some(Box::new(helper)));
                        }
                    }
                }
                Ok(None)
            }
            None => Ok(None),
        },
        ContextLookup::Format2 {
            coverage,
            classdef,
            subclasssets,
            phantom: _,
        } => match coverage.glyph_coverage_value(glyph) {
            Some(_index) => {
                let class_value = usize::from(classdef.glyph_class_value(glyph));
                subclasssets.check_index(class_value)?;
                if let Some(ref subclassset) = subclasssets[class_value] {
                    for subclassrule in &subclassset.subclassrules {
                        let match_context = MatchContext {
                            backtrack_table: GlyphTable::ById(&[]),
                            input_table: GlyphTable::ByClassDef(
                                Rc::clone(classdef),
                                &subclassrule.input_sequence,
                            ),
                            lookahead_table: GlyphTable::ById(&[]),
                        };
                        if matches(&match_context) {
                            let helper = ContextLookupHelper::new(
                                match_context,
                                &subclassrule.lookup_records,
                            );
                            return Ok(Some(Box::new(helper)));
                        }
                    }
                }
                Ok(None)
            }
            None => Ok(None),
        },
        ContextLookup::Format3 {
            coverages,
            lookup_records,
            phantom: _,
        } => {
            if coverages.is_empty() {
                return Ok(None);
            }
            match coverages[0].glyph_coverage_value(glyph) {
                Some(_index) => {
                    let match_context = MatchContext {
                        backtrack_table: GlyphTable::ById(&[]),
                        input_table: GlyphTable::ByCoverage(&coverages[1..]),
                        lookahead_table: GlyphTable::ById(&[]),
                    };
                    if matches(&match_context) {
                        let helper = ContextLookupHelper::new(match_context, lookup_records);
                        Ok(Some(Box::new(helper)))
                    } else {
                        Ok(None)
                    }
                }
                None => Ok(None),
            }
        }
    }
}

/// The chaining counterpart of [`context_lookup_info`].
pub fn chain_context_lookup_info<'a, T, Table: LayoutTableType>(
    chain_context_lookup: &'a ChainContextLookup<Table>,
    glyph: u16,
    matches: impl Fn(&MatchContext<'a>) -> bool,
) -> Result<Option<Box<ContextLookupHelper<'a, T>>>, ParseError> {
    match chain_context_lookup {
        ChainContextLookup::Format1 {
            coverage,
            chainsubrulesets,
            phantom: _,
        } => match coverage.glyph_coverage_value(glyph) {
            Some(index) => {
                let index = usize::from(index);
                chainsubrulesets.check_index(index)?;
                if let Some(ref chainsubruleset) = chainsubrulesets[index] {
                    for chainsubrule in &chainsubruleset.chainsubrules {
                        let match_context = MatchContext {
                            backtrack_table: GlyphTable::ById(&chainsubrule.backtrack_sequence),
                            input_table: GlyphTable::ById(&chainsubrule.input_sequence),
                            lookahead_table: GlyphTable::ById(&chainsubrule.lookahead_sequence),
                        };
                        if matches(&match_context) {
                            let helper = ContextLookupHelper::new(
                                match_context,
                                &chainsubrule.lookup_records,
                            );
                            return Ok(Some(Box::new(helper)));
                        }
                    }
                }
                Ok(None)
            }
            None => Ok(None),
        },
        ChainContextLookup::Format2 {
            coverage,
            backtrack_classdef,
            input_classdef,
            lookahead_classdef,
            chainsubclasssets,
            phantom: _,
        } => match coverage.glyph_coverage_value(glyph) {
            Some(_index) => {
                let class_value = usize::from(input_classdef.glyph_class_value(glyph));
                chainsubclasssets.check_index(class_value)?;
                if let Some(ref chainsubclassset) = chainsubclasssets[class_value] {
                    for chainsubclassrule in &chainsubclassset.chainsubclassrules {
                        let match_context = MatchContext {
                            backtrack_table: GlyphTable::ByClassDef(
                                Rc::clone(backtrack_classdef),
                                &chainsubclassrule.backtrack_sequence,
                            ),
                            input_table: GlyphTable::ByClassDef(
                                Rc::clone(input_classdef),
                                &chainsubclassrule.input_sequence,
                            ),
                            lookahead_table: GlyphTable::ByClassDef(
                                Rc::clone(lookahead_classdef),
                                &chainsubclassrule.lookahead_sequence,
                            ),
                        };
                        if matches(&match_context) {
                            let helper = ContextLookupHelper::new(
                                match_context,
                                &chainsubclassrule.lookup_records,
                            );
                            return Ok(Some(Box::new(helper)));
                        }
                    }
                }
                Ok(None)
            }
            None => Ok(None),
        },
        ChainContextLookup::Format3 {
            backtrack_coverages,
            input_coverages,
            lookahead_coverages,
            lookup_records,
            phantom: _,
        } => {
            if input_coverages.is_empty() {
                return Ok(None);
            }
            match input_coverages[0].glyph_coverage_value(glyph) {
                Some(_index) => {
                    let match_context = MatchContext {
                        backtrack_table: GlyphTable::ByCoverage(backtrack_coverages),
                        input_table: GlyphTable::ByCoverage(&input_coverages[1..]),
                        lookahead_table: GlyphTable::ByCoverage(lookahead_coverages),
                    };
                    if matches(&match_context) {
                        let helper = ContextLookupHelper::new(match_context, lookup_records);
                        Ok(Some(Box::new(helper)))
                    } else {
                        Ok(None)
                    }
                }
                None => Ok(None),
            }
        }
    }
}

impl ReverseChainSingleSubst {
    /// The substitute for `glyph` when its backtrack/lookahead windows
    /// match, decided by the caller through `matches`.
    pub fn apply_glyph(
        &self,
        glyph: u16,
        matches: impl Fn(&MatchContext<'_>) -> bool,
    ) -> Result<Option<u16>, ParseError> {
        match self {
            ReverseChainSingleSubst::Format1 {
                coverage,
                backtrack_coverages,
                lookahead_coverages,
                substitute_glyphs,
            } => match coverage.glyph_coverage_value(glyph) {
                Some(index) => {
                    let match_context = MatchContext {
                        backtrack_table: GlyphTable::ByCoverage(backtrack_coverages),
                        input_table: GlyphTable::ById(&[]),
                        lookahead_table: GlyphTable::ByCoverage(lookahead_coverages),
                    };
                    if matches(&match_context) {
                        let index = usize::from(index);
                        substitute_glyphs.check_index(index)?;
                        Ok(Some(substitute_glyphs[index]))
                    } else {
                        Ok(None)
                    }
                }
                None => Ok(None),
            },
        }
    }
}

fn read_objects<'a, T: ReadBinary<HostType<'a> = T>>(
    scope: &ReadScope<'a>,
    offsets: ReadArray<'a, U16Be>,
) -> Result<Vec<T>, ParseError> {
    let mut objects = Vec::with_capacity(offsets.len());
    for offset in &offsets {
        let object = scope.offset(usize::from(offset)).read::<T>()?;
        objects.push(object);
    }
    Ok(objects)
}

fn read_objects_nullable<'a, T: ReadBinary<HostType<'a> = T>>(
    scope: &ReadScope<'a>,
    offsets: ReadArray<'a, U16Be>,
) -> Result<Vec<Option<T>>, ParseError> {
    let mut objects = Vec::with_capacity(offsets.len());
    for offset in &offsets {
        if offset != 0 {
            let object = scope.offset(usize::from(offset)).read::<T>()?;
            objects.push(Some(object));
        } else {
            objects.push(None);
        }
    }
    Ok(objects)
}

fn read_coverages<'a>(
    scope: &ReadScope<'a>,
    cache: &LoadCache,
    offsets: ReadArray<'a, U16Be>,
) -> Result<Vec<Rc<Coverage>>, ParseError> {
    let mut coverages = Vec::with_capacity(offsets.len());
    for coverage_offset in &offsets {
        let coverage = scope
            .offset(usize::from(coverage_offset))
            .read_cache::<Coverage>(&mut cache.coverages.borrow_mut())?;
        coverages.push(coverage);
    }
    Ok(coverages)
}

/// Maps a sparse set of glyph ids to a dense 0-based index.
pub enum Coverage {
    Format1 {
        glyph_array: Vec<u16>,
    },
    Format2 {
        coverage_range_array: Vec<CoverageRangeRecord>,
    },
}

pub struct CoverageRangeRecord {
    start_glyph: u16,
    end_glyph: u16,
    start_coverage_index: u16,
}

impl ReadFrom for CoverageRangeRecord {
    type ReadType = (U16Be, U16Be, U16Be);
    fn read_from((start_glyph, end_glyph, start_coverage_index): (u16, u16, u16)) -> Self {
        CoverageRangeRecord {
            start_glyph,
            end_glyph,
            start_coverage_index,
        }
    }
}

impl ReadBinary for Coverage {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        match ctxt.read_u16be()? {
            1 => {
                let glyph_count = usize::from(ctxt.read_u16be()?);
                let glyph_array = ctxt.read_array_upto::<U16Be>(glyph_count)?.to_vec();
                Ok(Coverage::Format1 { glyph_array })
            }
            2 => {
                let range_count = usize::from(ctxt.read_u16be()?);
                let ranges = ctxt.read_array_upto::<CoverageRangeRecord>(range_count)?;
                // Records that break the sorted, non-overlapping invariant
                // are discarded rather than trusted for binary search.
                let mut coverage_range_array: Vec<CoverageRangeRecord> =
                    Vec::with_capacity(ranges.len());
                for range in &ranges {
                    let sorted = coverage_range_array
                        .last()
                        .map_or(true, |prev: &CoverageRangeRecord| {
                            prev.end_glyph < range.start_glyph
                        });
                    if range.start_glyph <= range.end_glyph && sorted {
                        coverage_range_array.push(range);
                    } else {
                        warn!(
                            "dropping corrupt coverage range {}..{}",
                            range.start_glyph, range.end_glyph
                        );
                    }
                }
                Ok(Coverage::Format2 {
                    coverage_range_array,
                })
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl Coverage {
    /// The dense coverage index of `glyph`, or `None` when not covered.
    pub fn glyph_coverage_value(&self, glyph: u16) -> Option<u16> {
        match *self {
            Coverage::Format1 { ref glyph_array } => {
                // The glyph array must be sorted for binary search
                match glyph_array.binary_search(&glyph) {
                    Ok(index) => Some(index as u16),
                    Err(_) => None,
                }
            }
            Coverage::Format2 {
                ref coverage_range_array,
            } => {
                let index = coverage_range_array
                    .binary_search_by(|range| range_compare(range.start_glyph, range.end_glyph, glyph))
                    .ok()?;
                let range = &coverage_range_array[index];
                Some(range.start_coverage_index + (glyph - range.start_glyph))
            }
        }
    }

    /// Total number of glyphs covered.
    pub fn glyph_count(&self) -> usize {
        match self {
            Coverage::Format1 { glyph_array } => glyph_array.len(),
            Coverage::Format2 {
                coverage_range_array,
            } => coverage_range_array.iter().fold(0, |acc, range| {
                acc + usize::from(range.end_glyph) - usize::from(range.start_glyph) + 1
            }),
        }
    }
}

fn range_compare(start: u16, end: u16, glyph: u16) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    if glyph < start {
        Ordering::Greater
    } else if glyph > end {
        Ordering::Less
    } else {
        Ordering::Equal
    }
}

/// Maps glyph ids to small integer classes. Class 0 is the implicit class
/// of every unlisted glyph.
pub enum ClassDef {
    Format1 {
        start_glyph: u16,
        class_value_array: Vec<u16>,
    },
    Format2 {
        class_range_array: Vec<ClassRangeRecord>,
    },
}

pub struct ClassRangeRecord {
    start_glyph: u16,
    end_glyph: u16,
    class_value: u16,
}

impl ReadFrom for ClassRangeRecord {
    type ReadType = (U16Be, U16Be, U16Be);
    fn read_from((start_glyph, end_glyph, class_value): (u16, u16, u16)) -> Self {
        ClassRangeRecord {
            start_glyph,
            end_glyph,
            class_value,
        }
    }
}

impl ReadBinary for ClassDef {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        match ctxt.read_u16be()? {
            1 => {
                let start_glyph = ctxt.read_u16be()?;
                let glyph_count = usize::from(ctxt.read_u16be()?);
                let class_value_array = ctxt.read_array_upto::<U16Be>(glyph_count)?.to_vec();
                Ok(ClassDef::Format1 {
                    start_glyph,
                    class_value_array,
                })
            }
            2 => {
                let range_count = usize::from(ctxt.read_u16be()?);
                // Fonts in circulation declare counts that exceed the table,
                // so the count is clamped rather than trusted.
                let ranges = ctxt.read_array_upto::<ClassRangeRecord>(range_count)?;
                // Corrupt ranges are dropped individually; the scan keeps
                // going so later valid ranges survive.
                let mut class_range_array: Vec<ClassRangeRecord> = Vec::with_capacity(ranges.len());
                for range in &ranges {
                    let sorted = class_range_array
                        .last()
                        .map_or(true, |prev: &ClassRangeRecord| {
                            prev.end_glyph < range.start_glyph
                        });
                    if range.start_glyph <= range.end_glyph && sorted {
                        class_range_array.push(range);
                    } else {
                        warn!(
                            "dropping corrupt class range {}..{}",
                            range.start_glyph, range.end_glyph
                        );
                    }
                }
                Ok(ClassDef::Format2 { class_range_array })
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl ClassDef {
    /// The class of `glyph`; 0 when the glyph is not listed.
    pub fn glyph_class_value(&self, glyph: u16) -> u16 {
        self.glyph_class_with_hint(glyph)
            .map(|(class, _hint)| class)
            .unwrap_or(0)
    }

    /// The class of `glyph` together with the index of the entry that
    /// supplied it, letting callers resume near the match instead of
    /// re-searching. `None` when the glyph is not listed.
    pub fn glyph_class_with_hint(&self, glyph: u16) -> Option<(u16, usize)> {
        match *self {
            ClassDef::Format1 {
                start_glyph,
                ref class_value_array,
            } => {
                if glyph >= start_glyph {
                    let index = usize::from(glyph - start_glyph);
                    class_value_array.get(index).map(|&class| (class, index))
                } else {
                    None
                }
            }
            ClassDef::Format2 {
                ref class_range_array,
            } => {
                let index = class_range_array
                    .binary_search_by(|range| range_compare(range.start_glyph, range.end_glyph, glyph))
                    .ok()?;
                Some((class_range_array[index].class_value, index))
            }
        }
    }
}
